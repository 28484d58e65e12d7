// SmartBasket terminal client: app orchestrator, routing, and TUI.

pub mod app;
pub mod protocol;
pub mod router;
pub mod tui;
