//! Core types for the RouteQA pipeline
//!
//! Everything persisted to disk (reports, anchors, session records, the
//! memory index, governance lines) round-trips through these types.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Console message severity as captured from the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Warn,
    Error,
    #[serde(rename = "pageerror")]
    PageError,
}

impl std::fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsoleLevel::Log => write!(f, "LOG"),
            ConsoleLevel::Warn => write!(f, "WARN"),
            ConsoleLevel::Error => write!(f, "ERROR"),
            ConsoleLevel::PageError => write!(f, "PAGEERROR"),
        }
    }
}

/// One entry in the run-scoped console stream
///
/// `source_url` is the page URL at capture time; route attribution is
/// done post-hoc by matching it against the route under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleLogEntry {
    pub timestamp_ms: i64,
    pub level: ConsoleLevel,
    pub text: String,
    pub source_url: String,
}

impl ConsoleLogEntry {
    /// Format as one line of the per-route log artifact:
    /// `[isoTimestamp] LEVEL: text`
    pub fn to_log_line(&self) -> String {
        let ts = DateTime::<Utc>::from_timestamp_millis(self.timestamp_ms)
            .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH);
        format!("[{}] {}: {}", ts.to_rfc3339(), self.level, self.text)
    }
}

/// UI validation probe results, derived synchronously after a route loads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteValidationResult {
    pub has_title: bool,
    pub sidebar_visible: bool,
    pub sidebar_width_px: f64,
    pub has_error_banner: bool,
    pub is_blank_dashboard: bool,
    pub content_element_count: u32,
    pub load_time_ms: u64,
}

impl Default for RouteValidationResult {
    fn default() -> Self {
        // Conservative defaults used when a probe throws
        Self {
            has_title: false,
            sidebar_visible: false,
            sidebar_width_px: 0.0,
            has_error_banner: false,
            is_blank_dashboard: false,
            content_element_count: 0,
            load_time_ms: 0,
        }
    }
}

/// Route outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteStatus {
    #[serde(rename = "PASSED")]
    Passed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl std::fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteStatus::Passed => write!(f, "PASSED"),
            RouteStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// One route's result, created by the executor and never mutated after
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteTestResult {
    pub route: String,
    pub status: RouteStatus,
    pub timestamp: DateTime<Utc>,
    pub screenshot_path: Option<String>,
    pub log_path: Option<String>,
    pub console_error_count: usize,
    pub validation: Option<RouteValidationResult>,
    pub error: Option<String>,
}

/// Per-suite tally
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

/// Results for one suite, keyed by route in execution order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub name: String,
    pub description: String,
    pub routes: IndexMap<String, RouteTestResult>,
    pub summary: SuiteSummary,
}

impl SuiteResult {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            routes: IndexMap::new(),
            summary: SuiteSummary::default(),
        }
    }

    /// Record a route result and update the tally
    pub fn push(&mut self, result: RouteTestResult) {
        match result.status {
            RouteStatus::Passed => self.summary.passed += 1,
            RouteStatus::Failed => self.summary.failed += 1,
        }
        self.summary.total += 1;
        self.routes.insert(result.route.clone(), result);
    }
}

// ============================================================================
// Verification report
// ============================================================================

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// Visual/validation issue categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    BlankDashboard,
    ErrorBanner,
    SidebarIssue,
    SlowLoad,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::BlankDashboard => "blank_dashboard",
            IssueType::ErrorBanner => "error_banner",
            IssueType::SidebarIssue => "sidebar_issue",
            IssueType::SlowLoad => "slow_load",
        }
    }
}

/// One detected validation issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub route: String,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    pub detail: String,
}

/// Recommendation priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

/// Actionable recommendation derived from an issue category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub category: String,
    pub message: String,
    pub details: Vec<String>,
}

/// Overall verdict with heuristic confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverallVerdict {
    pub passed: bool,
    /// 0-100, linear penalty sum clamped into range
    pub confidence: u8,
}

/// Console stream analysis
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConsoleAnalysis {
    pub critical_errors: Vec<ConsoleLogEntry>,
    pub warnings: Vec<ConsoleLogEntry>,
    pub critical_error_count: usize,
    pub warning_count: usize,
    pub error_count: usize,
    pub summary: String,
}

/// Screenshot/validation analysis
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenshotAnalysis {
    pub issues: Vec<ValidationIssue>,
    pub summary: String,
}

/// Verification report - a pure function of console logs and route results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub overall: OverallVerdict,
    pub console: ConsoleAnalysis,
    pub screenshots: ScreenshotAnalysis,
    pub recommendations: Vec<Recommendation>,
}

impl VerificationReport {
    /// Critical console errors plus high-severity visual issues; stamped
    /// into anchors and governance records
    pub fn critical_issue_count(&self) -> usize {
        self.console.critical_error_count
            + self.screenshots.issues.iter().filter(|i| i.severity == Severity::High).count()
    }
}

// ============================================================================
// Run-level report
// ============================================================================

/// Flat index of artifacts produced during the run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactIndex {
    pub screenshots: Vec<String>,
    pub logs: Vec<String>,
}

/// Run-level tally
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    /// Percentage rounded to one decimal; 0.0 when there were no tests
    pub pass_rate: f64,
}

/// The unit of record for one pipeline run, immutable once written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaReport {
    pub timestamp: DateTime<Utc>,
    pub branch_label: String,
    pub environment: String,
    pub test_suites: IndexMap<String, SuiteResult>,
    pub artifacts: ArtifactIndex,
    pub summary: RunSummary,
    pub verification: VerificationReport,
}

impl QaReport {
    /// Overall run success: pass rate threshold and verification verdict
    pub fn overall_success(&self) -> bool {
        self.summary.pass_rate >= 75.0 && self.verification.overall.passed
    }
}

/// Condensed metrics for external consumers (`qa-execution-summary`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub timestamp: DateTime<Utc>,
    pub environment: String,
    pub branch_label: String,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub pass_rate: f64,
    pub confidence: u8,
    pub verification_passed: bool,
    pub overall_success: bool,
    pub suites: Vec<String>,
}

/// Written on fatal abort (`qa-failure-report`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub timestamp: DateTime<Utc>,
    pub environment: String,
    pub error_kind: String,
    pub error_message: String,
    pub phase: String,
    pub elapsed_ms: u64,
}

// ============================================================================
// Memory anchors
// ============================================================================

/// Anchor status mirrors the run outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorStatus {
    Passed,
    Failed,
}

impl std::fmt::Display for AnchorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnchorStatus::Passed => write!(f, "passed"),
            AnchorStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Metrics snapshot embedded in an anchor
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnchorMetrics {
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub pass_rate: f64,
    pub confidence: u8,
}

/// Verification summary embedded in an anchor
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnchorVerification {
    pub passed: bool,
    pub confidence: u8,
    pub critical_issues: usize,
}

/// Cross-references from an anchor to its artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorLinks {
    pub governance_entry_id: Option<String>,
    pub artifact_bundle_path: String,
    pub session_data_path: String,
}

/// Search facets computed from the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub routes_tested: Vec<String>,
    pub issue_types: Vec<String>,
    pub keywords: Vec<String>,
}

/// Durable, taggable record of one run; created once, never mutated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryAnchor {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub status: AnchorStatus,
    pub metrics: AnchorMetrics,
    pub test_suites: Vec<String>,
    pub verification: AnchorVerification,
    pub links: AnchorLinks,
    pub memory_tags: Vec<String>,
    pub search_metadata: SearchMetadata,
}

/// Slowest/fastest route timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteTiming {
    pub route: String,
    pub load_time_ms: u64,
}

/// Route timing statistics across all suites
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub avg_route_time_ms: f64,
    pub slowest_route: Option<RouteTiming>,
    pub fastest_route: Option<RouteTiming>,
}

/// Where and how the run executed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub environment: String,
    pub base_url: String,
    pub branch_label: String,
    pub pipeline_version: String,
}

/// Placeholders for cross-run trend analysis; populated by later consumers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendPlaceholders {
    pub previous_run_id: Option<String>,
    pub regression_notes: Vec<String>,
}

/// Detailed session record, 1:1 with a MemoryAnchor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub anchor_id: String,
    pub execution_context: ExecutionContext,
    pub detailed_results: IndexMap<String, SuiteResult>,
    pub performance: PerformanceStats,
    /// Frequency of console error "type" prefixes, e.g. "TypeError" -> 3
    pub error_analysis: BTreeMap<String, usize>,
    pub trend: TrendPlaceholders,
}

/// One row of the capped, recency-sorted search index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryIndexEntry {
    pub id: String,
    pub timestamp_ms: i64,
    pub status: AnchorStatus,
    pub branch: String,
    pub environment: String,
    pub pass_rate: f64,
    pub confidence: u8,
    pub tags: Vec<String>,
    pub search_keywords: Vec<String>,
}

/// One file copied into an anchor bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleEntry {
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

/// Manifest written alongside a bundle's copied artifacts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleManifest {
    pub anchor_id: String,
    pub entries: Vec<BundleEntry>,
    pub skipped: Vec<String>,
}

// ============================================================================
// Governance
// ============================================================================

/// Host/process context attached to governance records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeContext {
    pub pipeline_version: String,
    pub environment: String,
    pub os: String,
}

impl RuntimeContext {
    pub fn current(environment: impl Into<String>) -> Self {
        Self {
            pipeline_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: environment.into(),
            os: std::env::consts::OS.to_string(),
        }
    }
}

/// Append-only governance log record, one JSON line per run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceEntry {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub actor: String,
    pub resource_id: String,
    pub action: String,
    pub success: bool,
    pub details: serde_json::Value,
    pub runtime_context: RuntimeContext,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_log_line_format() {
        let entry = ConsoleLogEntry {
            timestamp_ms: 0,
            level: ConsoleLevel::Error,
            text: "TypeError: x is null".to_string(),
            source_url: "http://localhost:3000/admin".to_string(),
        };
        assert_eq!(
            entry.to_log_line(),
            "[1970-01-01T00:00:00+00:00] ERROR: TypeError: x is null"
        );
    }

    #[test]
    fn test_route_status_serde_uppercase() {
        let json = serde_json::to_string(&RouteStatus::Passed).unwrap();
        assert_eq!(json, r#""PASSED""#);
        let back: RouteStatus = serde_json::from_str(r#""FAILED""#).unwrap();
        assert_eq!(back, RouteStatus::Failed);
    }

    #[test]
    fn test_issue_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&IssueType::BlankDashboard).unwrap(),
            r#""blank_dashboard""#
        );
        assert_eq!(IssueType::SidebarIssue.as_str(), "sidebar_issue");
    }

    #[test]
    fn test_suite_result_tally() {
        let mut suite = SuiteResult::new("admin", "Admin routes");
        suite.push(RouteTestResult {
            route: "/admin".to_string(),
            status: RouteStatus::Passed,
            timestamp: Utc::now(),
            screenshot_path: None,
            log_path: None,
            console_error_count: 0,
            validation: Some(RouteValidationResult::default()),
            error: None,
        });
        suite.push(RouteTestResult {
            route: "/admin/settings".to_string(),
            status: RouteStatus::Failed,
            timestamp: Utc::now(),
            screenshot_path: None,
            log_path: None,
            console_error_count: 2,
            validation: None,
            error: Some("navigation timeout".to_string()),
        });

        assert_eq!(suite.summary.passed, 1);
        assert_eq!(suite.summary.failed, 1);
        assert_eq!(suite.summary.total, 2);
        // Execution order preserved
        let keys: Vec<_> = suite.routes.keys().cloned().collect();
        assert_eq!(keys, vec!["/admin", "/admin/settings"]);
    }

    #[test]
    fn test_critical_issue_count_spans_console_and_visual() {
        let report = VerificationReport {
            overall: OverallVerdict { passed: false, confidence: 35 },
            console: ConsoleAnalysis {
                critical_error_count: 2,
                ..Default::default()
            },
            screenshots: ScreenshotAnalysis {
                issues: vec![
                    ValidationIssue {
                        route: "/a".to_string(),
                        issue_type: IssueType::BlankDashboard,
                        severity: Severity::High,
                        detail: "blank".to_string(),
                    },
                    ValidationIssue {
                        route: "/b".to_string(),
                        issue_type: IssueType::SlowLoad,
                        severity: Severity::Medium,
                        detail: "slow".to_string(),
                    },
                ],
                summary: String::new(),
            },
            recommendations: vec![],
        };
        // Medium issues do not count
        assert_eq!(report.critical_issue_count(), 3);
    }

    #[test]
    fn test_overall_success_requires_both_gates() {
        let verdict_pass = OverallVerdict { passed: true, confidence: 90 };
        let mut report = QaReport {
            timestamp: Utc::now(),
            branch_label: "main".to_string(),
            environment: "development".to_string(),
            test_suites: IndexMap::new(),
            artifacts: ArtifactIndex::default(),
            summary: RunSummary { total_tests: 4, passed_tests: 3, failed_tests: 1, pass_rate: 75.0 },
            verification: VerificationReport {
                overall: verdict_pass,
                console: ConsoleAnalysis::default(),
                screenshots: ScreenshotAnalysis::default(),
                recommendations: vec![],
            },
        };
        assert!(report.overall_success());

        report.summary.pass_rate = 74.9;
        assert!(!report.overall_success());

        report.summary.pass_rate = 100.0;
        report.verification.overall.passed = false;
        assert!(!report.overall_success());
    }
}
