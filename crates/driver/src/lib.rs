//! RouteQA browser driving layer
//!
//! Owns the run-scoped browser session (one browser, one page), the agent
//! process protocol, the shared console log buffer, and the environment
//! bootstrap for the system under test.

pub mod agent;
pub mod console;
pub mod server;
pub mod session;

pub use agent::ElementBox;
pub use console::{filter_by_route, ConsoleBuffer};
pub use server::EnvironmentHandle;
pub use session::{BrowserSession, PageDriver};
