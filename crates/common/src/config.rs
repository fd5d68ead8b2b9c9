//! Run configuration and suite registry
//!
//! The configuration document is YAML, loaded once per run. Validation is
//! side-effect free and safe to call repeatedly.

use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Framework identity stamped into reports and anchors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkInfo {
    pub name: String,
    pub version: String,
}

/// A deployment target to test against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub base_url: String,
    /// Black-box dev-server bootstrap, run before testing begins
    #[serde(default)]
    pub startup_command: Option<String>,
    /// Delay after spawning the startup command before health checks
    #[serde(default)]
    pub start_delay_ms: u64,
}

/// Browser viewport
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 1280, height: 720 }
    }
}

/// Browser launch settings, scoped to the whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub viewport: Viewport,
    /// Default per-route navigation timeout
    #[serde(default = "default_nav_timeout")]
    pub timeout_ms: u64,
    /// Fixed settle delay after each navigation before validation
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_nav_timeout() -> u64 {
    30_000
}

fn default_settle_delay() -> u64 {
    2_000
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            args: Vec::new(),
            viewport: Viewport::default(),
            timeout_ms: default_nav_timeout(),
            settle_delay_ms: default_settle_delay(),
        }
    }
}

/// Screenshot capture options
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScreenshotOptions {
    #[serde(default)]
    pub full_page: bool,
}

/// One named group of routes tested under shared settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteConfig {
    /// Filled from the map key by the registry
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub routes: Vec<String>,
    pub enabled: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub screenshot_options: Option<ScreenshotOptions>,
}

/// Console classification patterns, evaluated in order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleAnalysisConfig {
    #[serde(default)]
    pub critical_error_patterns: Vec<String>,
    #[serde(default)]
    pub warning_patterns: Vec<String>,
}

/// Screenshot/validation thresholds and selectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotAnalysisConfig {
    #[serde(default = "default_min_sidebar_width")]
    pub min_sidebar_width: f64,
    #[serde(default = "default_max_load_time")]
    pub max_load_time_ms: u64,
    #[serde(default)]
    pub error_indicators: Vec<String>,
    #[serde(default = "default_sidebar_selector")]
    pub sidebar_selector: String,
    #[serde(default = "default_content_selector")]
    pub content_selector: String,
}

fn default_min_sidebar_width() -> f64 {
    60.0
}

fn default_max_load_time() -> u64 {
    10_000
}

fn default_sidebar_selector() -> String {
    "nav, aside, [data-testid=\"sidebar\"]".to_string()
}

fn default_content_selector() -> String {
    "main *, [data-testid], table, form, button, .card".to_string()
}

impl Default for ScreenshotAnalysisConfig {
    fn default() -> Self {
        Self {
            min_sidebar_width: default_min_sidebar_width(),
            max_load_time_ms: default_max_load_time(),
            error_indicators: Vec::new(),
            sidebar_selector: default_sidebar_selector(),
            content_selector: default_content_selector(),
        }
    }
}

/// Heuristic verification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Confidence below this raises a low-confidence recommendation
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: u8,
    #[serde(default)]
    pub console_analysis: ConsoleAnalysisConfig,
    #[serde(default)]
    pub screenshot_analysis: ScreenshotAnalysisConfig,
}

fn default_confidence_threshold() -> u8 {
    70
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            console_analysis: ConsoleAnalysisConfig::default(),
            screenshot_analysis: ScreenshotAnalysisConfig::default(),
        }
    }
}

/// Wrapper matching the document's `verification.ai` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationSection {
    #[serde(default)]
    pub ai: VerificationConfig,
}

/// Where one artifact type is written; `format` is a filename template
/// with `{route}` and `{timestamp}` placeholders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSpec {
    pub path: String,
    pub format: String,
}

/// Memory anchor store location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryAnchorConfig {
    pub base: String,
    #[serde(default = "default_anchor_version")]
    pub version: String,
}

fn default_anchor_version() -> String {
    "1".to_string()
}

/// Governance log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    pub enabled: bool,
    pub log_path: String,
    pub memory_anchors: MemoryAnchorConfig,
}

/// The complete run configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub framework: Option<FrameworkInfo>,
    #[serde(default)]
    pub environments: IndexMap<String, EnvironmentConfig>,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub test_suites: IndexMap<String, TestSuiteConfig>,
    pub verification: Option<VerificationSection>,
    #[serde(default)]
    pub artifacts: IndexMap<String, ArtifactSpec>,
    pub governance: Option<GovernanceConfig>,
}

impl RunConfig {
    /// Parse a configuration document from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load a configuration document from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Validate the document for a run against `environment`.
    ///
    /// Idempotent; fails with `Error::Configuration` when a required
    /// section is missing, the environment key is unknown, or no suite
    /// is enabled.
    pub fn validate(&self, environment: &str) -> Result<()> {
        if self.framework.is_none() {
            return Err(Error::Configuration("missing section: framework".to_string()));
        }
        if self.environments.is_empty() {
            return Err(Error::Configuration("missing section: environments".to_string()));
        }
        if self.test_suites.is_empty() {
            return Err(Error::Configuration("missing section: test_suites".to_string()));
        }
        if self.verification.is_none() {
            return Err(Error::Configuration("missing section: verification".to_string()));
        }
        if self.artifacts.is_empty() {
            return Err(Error::Configuration("missing section: artifacts".to_string()));
        }
        if self.governance.is_none() {
            return Err(Error::Configuration("missing section: governance".to_string()));
        }
        if !self.environments.contains_key(environment) {
            return Err(Error::Configuration(format!(
                "unknown environment: {} (have: {})",
                environment,
                self.environments.keys().cloned().collect::<Vec<_>>().join(", ")
            )));
        }
        if !self.test_suites.values().any(|s| s.enabled) {
            return Err(Error::Configuration("no enabled test suites".to_string()));
        }
        Ok(())
    }

    /// Enabled suites in declaration order, with `name` filled from the key
    pub fn enabled_suites(&self) -> Vec<TestSuiteConfig> {
        self.test_suites
            .iter()
            .filter(|(_, s)| s.enabled)
            .map(|(name, s)| {
                let mut suite = s.clone();
                suite.name = name.clone();
                suite
            })
            .collect()
    }

    /// The environment config for `name`; call `validate` first
    pub fn environment(&self, name: &str) -> Result<&EnvironmentConfig> {
        self.environments
            .get(name)
            .ok_or_else(|| Error::Configuration(format!("unknown environment: {}", name)))
    }

    /// Verification settings, defaults when the section is absent
    pub fn verification_config(&self) -> VerificationConfig {
        self.verification
            .as_ref()
            .map(|v| v.ai.clone())
            .unwrap_or_default()
    }

    /// Artifact spec for a type (`screenshots`, `logs`, `reports`)
    pub fn artifact_spec(&self, kind: &str) -> Result<&ArtifactSpec> {
        self.artifacts
            .get(kind)
            .ok_or_else(|| Error::Configuration(format!("missing artifacts.{} section", kind)))
    }

    /// A commented starter document
    pub fn default_document() -> &'static str {
        DEFAULT_DOCUMENT
    }
}

/// Render an artifact filename template.
///
/// `{route}` is slugified (slashes become dashes, a bare `/` becomes
/// `root`) and `{timestamp}` is the supplied epoch-millis value.
pub fn render_template(template: &str, route: &str, timestamp_ms: i64) -> String {
    template
        .replace("{route}", &route_slug(route))
        .replace("{timestamp}", &timestamp_ms.to_string())
}

/// Filesystem-safe slug for a route path
pub fn route_slug(route: &str) -> String {
    let trimmed = route.trim_matches('/');
    if trimmed.is_empty() {
        return "root".to_string();
    }
    trimmed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

const DEFAULT_DOCUMENT: &str = r#"# RouteQA run configuration
framework:
  name: routeqa
  version: "0.1.0"

environments:
  development:
    base_url: http://localhost:3000
    startup_command: npm run dev
    start_delay_ms: 5000
  staging:
    base_url: https://staging.example.com
    start_delay_ms: 0

browser:
  headless: true
  args: []
  viewport:
    width: 1280
    height: 720
  timeout_ms: 30000
  settle_delay_ms: 2000

test_suites:
  core:
    description: Core navigation routes
    enabled: true
    routes:
      - /
      - /dashboard
  admin:
    description: Admin surface
    enabled: false
    routes:
      - /admin

verification:
  ai:
    confidence_threshold: 70
    console_analysis:
      critical_error_patterns:
        - "TypeError"
        - "ReferenceError"
        - "Cannot read properties"
        - "Failed to fetch"
      warning_patterns:
        - "deprecated"
    screenshot_analysis:
      min_sidebar_width: 60
      max_load_time_ms: 10000
      error_indicators:
        - "Something went wrong"
        - "Application error"
        - "404"

artifacts:
  screenshots:
    path: qa-artifacts/screenshots
    format: "{route}-{timestamp}.png"
  logs:
    path: qa-artifacts/logs
    format: "{route}-{timestamp}.log"
  reports:
    path: qa-artifacts/reports
    format: "qa-report-{timestamp}.json"

governance:
  enabled: true
  log_path: qa-artifacts/governance.jsonl
  memory_anchors:
    base: qa-memory
    version: "1"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> RunConfig {
        RunConfig::from_yaml(DEFAULT_DOCUMENT).unwrap()
    }

    #[test]
    fn test_default_document_parses_and_validates() {
        let config = valid_config();
        config.validate("development").unwrap();
    }

    #[test]
    fn test_unknown_environment_rejected() {
        let config = valid_config();
        let err = config.validate("production").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("unknown environment"));
    }

    #[test]
    fn test_missing_sections_rejected() {
        let yaml = r#"
framework:
  name: routeqa
  version: "0.1.0"
environments:
  development:
    base_url: http://localhost:3000
"#;
        let config = RunConfig::from_yaml(yaml).unwrap();
        let err = config.validate("development").unwrap_err();
        assert!(err.to_string().contains("test_suites"));
    }

    #[test]
    fn test_no_enabled_suites_rejected() {
        let mut config = valid_config();
        for suite in config.test_suites.values_mut() {
            suite.enabled = false;
        }
        let err = config.validate("development").unwrap_err();
        assert!(err.to_string().contains("no enabled test suites"));
    }

    #[test]
    fn test_enabled_suites_preserve_declaration_order_and_names() {
        let yaml = r#"
test_suites:
  zeta:
    enabled: true
    routes: ["/z"]
  alpha:
    enabled: true
    routes: ["/a"]
  skipped:
    enabled: false
    routes: ["/s"]
"#;
        let config = RunConfig::from_yaml(yaml).unwrap();
        let suites = config.enabled_suites();
        let names: Vec<_> = suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_validate_is_idempotent() {
        let config = valid_config();
        config.validate("development").unwrap();
        config.validate("development").unwrap();
        assert_eq!(config.enabled_suites().len(), config.enabled_suites().len());
    }

    #[test]
    fn test_render_template() {
        assert_eq!(
            render_template("{route}-{timestamp}.png", "/admin/users", 1700000000000),
            "admin-users-1700000000000.png"
        );
        assert_eq!(
            render_template("{route}-{timestamp}.log", "/", 5),
            "root-5.log"
        );
    }

    #[test]
    fn test_route_slug_sanitizes() {
        assert_eq!(route_slug("/orbis/sub-apps?id=1"), "orbis-sub-apps-id-1");
        assert_eq!(route_slug("/"), "root");
    }

    #[test]
    fn test_verification_defaults() {
        let config = RunConfig::from_yaml("test_suites: {}").unwrap();
        let vc = config.verification_config();
        assert_eq!(vc.screenshot_analysis.min_sidebar_width, 60.0);
        assert_eq!(vc.screenshot_analysis.max_load_time_ms, 10_000);
        assert_eq!(vc.confidence_threshold, 70);
        // The absent-section path and the serde default must agree
        assert_eq!(
            VerificationConfig::default().confidence_threshold,
            serde_yaml::from_str::<VerificationConfig>("console_analysis: {}")
                .unwrap()
                .confidence_threshold
        );
    }
}
