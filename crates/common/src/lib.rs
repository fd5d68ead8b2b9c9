//! RouteQA Common Library
//!
//! Shared data model, run configuration, and error taxonomy for the
//! RouteQA verification pipeline.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    render_template, route_slug, BrowserConfig, EnvironmentConfig, RunConfig, ScreenshotOptions,
    TestSuiteConfig, VerificationConfig,
};
pub use error::{Error, Result};
pub use types::*;

/// RouteQA version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fixed tags attached to every memory anchor
pub const FRAMEWORK_TAGS: &[&str] = &["qa", "routeqa", "verification"];

/// Fixed keyword set seeding anchor search metadata
pub const SEARCH_KEYWORDS: &[&str] = &["qa-run", "route-verification", "console-analysis"];
