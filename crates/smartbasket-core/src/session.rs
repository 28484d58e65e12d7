// Session lifecycle: token persistence and the current user.
//
//   Unknown --(token + /users/me ok)--> Authenticated
//   Unknown --(no token | /users/me failed)--> Anonymous
//   any --(login | register)--> Authenticated
//   any --(logout)--> Anonymous
//
// Network calls are not made here. The orchestrator runs `authenticate` /
// `register_account` / `BasketApi::current_user` in background tasks and
// feeds the outcome back through the `*_succeeded` / `*_failed` methods, so
// the state machine itself stays synchronous.

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, BasketApi};
use crate::models::{Credentials, NewUser, User};
use crate::storage::{LocalStorage, TOKEN_KEY};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Startup, before the stored token (if any) has been checked.
    Unknown,
    Anonymous,
    Authenticated(User),
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(User::is_admin)
    }
}

// ---------------------------------------------------------------------------
// Registration form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Passwords don't match")]
    PasswordMismatch,

    #[error("{0} is required")]
    MissingField(&'static str),
}

/// Registration input as typed by the user, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    /// Check the form locally and build the API payload.
    pub fn validate(&self) -> Result<NewUser, SessionError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(SessionError::MissingField("Username"));
        }
        if self.password.is_empty() {
            return Err(SessionError::MissingField("Password"));
        }
        if self.password != self.confirm_password {
            return Err(SessionError::PasswordMismatch);
        }
        Ok(NewUser {
            username: username.to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session {
    storage: LocalStorage,
    state: SessionState,
    /// Bumped on every transition into or out of `Authenticated`. Results of
    /// requests issued under an older generation are stale.
    generation: u64,
}

impl Session {
    pub fn new(storage: LocalStorage) -> Self {
        Self {
            storage,
            state: SessionState::Unknown,
            generation: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn user(&self) -> Option<&User> {
        self.state.user()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The stored bearer token, if any. Storage failures read as "no token".
    pub fn token(&self) -> Option<String> {
        match self.storage.get_item(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("Failed to read stored token: {:#}", e);
                None
            }
        }
    }

    /// Start the startup check. Returns the token to validate against
    /// `/users/me`, or moves straight to `Anonymous` when none is stored.
    pub fn begin_restore(&mut self) -> Option<String> {
        let token = self.token();
        if token.is_none() {
            info!("No stored token, starting anonymous");
            self.state = SessionState::Anonymous;
        }
        token
    }

    pub fn restore_succeeded(&mut self, user: User) {
        info!("Session restored for {}", user.username);
        self.set_authenticated(user);
    }

    /// The stored token was rejected (or the check failed): forget it.
    pub fn restore_failed(&mut self) {
        info!("Stored token rejected, clearing session");
        self.logout();
    }

    /// Persist `token` and enter `Authenticated`.
    pub fn login_succeeded(&mut self, token: &str, user: User) {
        if let Err(e) = self.storage.set_item(TOKEN_KEY, token) {
            warn!("Failed to persist token: {:#}", e);
        }
        info!("Logged in as {}", user.username);
        self.set_authenticated(user);
    }

    /// Replace the user record after a successful refresh.
    pub fn user_refreshed(&mut self, user: User) {
        if self.state.is_authenticated() {
            self.state = SessionState::Authenticated(user);
        }
    }

    pub fn logout(&mut self) {
        if let Err(e) = self.storage.remove_item(TOKEN_KEY) {
            warn!("Failed to remove stored token: {:#}", e);
        }
        if self.state.is_authenticated() {
            self.generation += 1;
        }
        self.state = SessionState::Anonymous;
    }

    fn set_authenticated(&mut self, user: User) {
        self.generation += 1;
        self.state = SessionState::Authenticated(user);
    }
}

// ---------------------------------------------------------------------------
// Network halves of the transitions
// ---------------------------------------------------------------------------

/// Exchange credentials for a token, then fetch the user it belongs to.
pub async fn authenticate(
    api: &dyn BasketApi,
    credentials: &Credentials,
) -> Result<(String, User), ApiError> {
    let token = api.login(credentials).await?.access_token;
    let user = api.current_user(&token).await?;
    Ok((token, user))
}

/// Create the account, then log in with the same credentials.
pub async fn register_account(
    api: &dyn BasketApi,
    new_user: &NewUser,
) -> Result<(String, User), ApiError> {
    api.register(new_user).await?;
    authenticate(
        api,
        &Credentials {
            username: new_user.username.clone(),
            password: new_user.password.clone(),
        },
    )
    .await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
