// Routes and route guards.
//
// Every screen the client can show is a `Route`. Before a route is rendered
// the guard in `check_access` decides whether the current session may see it;
// `resolve` turns a denial into the route the user should land on instead.

use smartbasket_core::session::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    /// Home screen.
    Dashboard,
    Profile,
    Predictions,
    Transactions,
    Settings,
    AdminModels,
}

impl Route {
    /// Routes shown in the sidebar, in display order. `AdminModels` is only
    /// listed for admins (see `sidebar_routes`).
    const SIDEBAR: [Route; 6] = [
        Route::Dashboard,
        Route::Profile,
        Route::Predictions,
        Route::Transactions,
        Route::Settings,
        Route::AdminModels,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Route::Login => "Login",
            Route::Register => "Register",
            Route::Dashboard => "Dashboard",
            Route::Profile => "Profile",
            Route::Predictions => "Predictions",
            Route::Transactions => "Transactions",
            Route::Settings => "Settings",
            Route::AdminModels => "Admin: Models",
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Route::Login | Route::Register)
    }

    pub fn requires_admin(&self) -> bool {
        matches!(self, Route::AdminModels)
    }

    /// Sidebar entries visible to a user with the given admin flag.
    pub fn sidebar_routes(is_admin: bool) -> Vec<Route> {
        Self::SIDEBAR
            .into_iter()
            .filter(|r| is_admin || !r.requires_admin())
            .collect()
    }

    /// Route bound to a sidebar digit key (`1` = first entry).
    pub fn from_sidebar_key(digit: char, is_admin: bool) -> Option<Route> {
        let index = digit.to_digit(10)?.checked_sub(1)? as usize;
        Self::sidebar_routes(is_admin).get(index).copied()
    }
}

/// Outcome of the route guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    /// Session check still in flight; show the loading view.
    Pending,
    RedirectToLogin,
    /// Signed in but lacking the required role.
    Forbidden,
}

pub fn check_access(route: Route, session: &SessionState) -> Access {
    if route.is_public() {
        return Access::Granted;
    }
    match session {
        SessionState::Unknown => Access::Pending,
        SessionState::Anonymous => Access::RedirectToLogin,
        SessionState::Authenticated(user) => {
            if route.requires_admin() && !user.is_admin() {
                Access::Forbidden
            } else {
                Access::Granted
            }
        }
    }
}

/// The route actually shown for a request to `route`. Pending access keeps
/// the requested route so it renders once the session check completes.
pub fn resolve(route: Route, session: &SessionState) -> Route {
    match check_access(route, session) {
        Access::Granted | Access::Pending => route,
        Access::RedirectToLogin => Route::Login,
        Access::Forbidden => Route::Dashboard,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use smartbasket_core::models::{Role, User};

    const PROTECTED: [Route; 6] = [
        Route::Dashboard,
        Route::Profile,
        Route::Predictions,
        Route::Transactions,
        Route::Settings,
        Route::AdminModels,
    ];

    fn signed_in(role: Role) -> SessionState {
        SessionState::Authenticated(User {
            id: 1,
            username: "ana".into(),
            email: "ana@example.com".into(),
            role,
            is_active: true,
            created_at: None,
        })
    }

    #[test]
    fn anonymous_protected_routes_redirect_to_login() {
        for route in PROTECTED {
            assert_eq!(
                resolve(route, &SessionState::Anonymous),
                Route::Login,
                "{route:?}"
            );
        }
    }

    #[test]
    fn public_routes_always_granted() {
        for session in [SessionState::Unknown, SessionState::Anonymous, signed_in(Role::User)] {
            assert_eq!(check_access(Route::Login, &session), Access::Granted);
            assert_eq!(check_access(Route::Register, &session), Access::Granted);
        }
    }

    #[test]
    fn unknown_session_is_pending() {
        assert_eq!(
            check_access(Route::Predictions, &SessionState::Unknown),
            Access::Pending
        );
        assert_eq!(
            resolve(Route::Predictions, &SessionState::Unknown),
            Route::Predictions
        );
    }

    #[test]
    fn admin_route_requires_admin_role() {
        assert_eq!(
            check_access(Route::AdminModels, &signed_in(Role::User)),
            Access::Forbidden
        );
        assert_eq!(
            resolve(Route::AdminModels, &signed_in(Role::User)),
            Route::Dashboard
        );
        assert_eq!(
            resolve(Route::AdminModels, &signed_in(Role::Admin)),
            Route::AdminModels
        );
    }

    #[test]
    fn sidebar_hides_admin_entry_for_users() {
        let user = Route::sidebar_routes(false);
        assert_eq!(user.len(), 5);
        assert!(!user.contains(&Route::AdminModels));

        let admin = Route::sidebar_routes(true);
        assert_eq!(admin.last(), Some(&Route::AdminModels));
    }

    #[test]
    fn sidebar_keys_map_to_entries() {
        assert_eq!(Route::from_sidebar_key('1', false), Some(Route::Dashboard));
        assert_eq!(Route::from_sidebar_key('3', false), Some(Route::Predictions));
        assert_eq!(Route::from_sidebar_key('6', false), None);
        assert_eq!(Route::from_sidebar_key('6', true), Some(Route::AdminModels));
        assert_eq!(Route::from_sidebar_key('0', true), None);
    }

    #[test]
    fn titles() {
        assert_eq!(Route::AdminModels.title(), "Admin: Models");
        assert_eq!(Route::Dashboard.title(), "Dashboard");
    }
}
