//! Error types for RouteQA

use thiserror::Error;

/// Result type alias using RouteQA Error
pub type Result<T> = std::result::Result<T, Error>;

/// RouteQA error types
///
/// Fatal variants abort the run (after a failure report and an optional
/// governance record); everything else is recovered at the smallest
/// possible scope - one route, one artifact, one log line.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Environment startup failed: {0}")]
    EnvironmentStartup(String),

    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Navigation to {route} failed: {reason}")]
    Navigation { route: String, reason: String },

    #[error("Navigation to {route} timed out after {ms}ms")]
    RouteTimeout { route: String, ms: u64 },

    #[error("Artifact write failed: {0}")]
    ArtifactWrite(String),

    #[error("Analysis probe failed: {0}")]
    Analysis(String),

    #[error("Governance write failed: {0}")]
    GovernanceWrite(String),
}

impl Error {
    /// Fatal errors abort the run and propagate a non-zero exit.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::EnvironmentStartup(_) | Error::BrowserLaunch(_)
        )
    }

    /// Short machine-readable kind, used in failure reports and governance records.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
            Error::ConfigParse(_) => "config_parse",
            Error::Configuration(_) => "configuration",
            Error::EnvironmentStartup(_) => "environment_startup",
            Error::BrowserLaunch(_) => "browser_launch",
            Error::Navigation { .. } => "navigation",
            Error::RouteTimeout { .. } => "route_timeout",
            Error::ArtifactWrite(_) => "artifact_write",
            Error::Analysis(_) => "analysis",
            Error::GovernanceWrite(_) => "governance_write",
        }
    }
}
