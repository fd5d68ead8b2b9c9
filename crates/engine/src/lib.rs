//! RouteQA execution and verification engine
//!
//! `executor` drives routes through a `PageDriver`, `validate` runs the
//! post-load UI probes, `verify` turns the run's evidence into a
//! deterministic verdict, and `report` bundles everything into the
//! run-level report artifacts.

pub mod executor;
pub mod report;
pub mod validate;
pub mod verify;

pub use executor::{ExecutorContext, RouteExecutor};
pub use report::{bundle, write_execution_summary, write_failure_report, write_report};
pub use verify::verify;
