//! Append-only governance log
//!
//! One JSON line per pipeline event. The log is an audit trail, not a
//! control surface: write failures are logged and swallowed so governance
//! can never fail a run that otherwise succeeded.

use routeqa_common::config::GovernanceConfig;
use routeqa_common::types::{GovernanceEntry, QaReport, RuntimeContext};
use routeqa_common::Error;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, warn};
use uuid::Uuid;

const ACTOR: &str = "routeqa-pipeline";

/// Generate a governance entry id, referenced from the run's anchor
pub fn new_entry_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("gov-{}", &uuid[..12])
}

/// Best-effort JSONL sink for governance records
pub struct GovernanceSink {
    path: Option<PathBuf>,
}

impl GovernanceSink {
    /// Build a sink from the optional governance section; an absent or
    /// disabled section yields a no-op sink
    pub fn new(config: Option<&GovernanceConfig>) -> Self {
        let path = config
            .filter(|c| c.enabled)
            .map(|c| PathBuf::from(&c.log_path));
        if path.is_none() {
            debug!("Governance logging disabled");
        }
        Self { path }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Record a completed run
    pub fn record_qa_result(
        &self,
        entry_id: &str,
        report: &QaReport,
        anchor_id: Option<&str>,
        report_path: Option<&str>,
    ) {
        let summary = format!(
            "{}/{} routes passed ({:.1}%), confidence {}/100, verification {}",
            report.summary.passed_tests,
            report.summary.total_tests,
            report.summary.pass_rate,
            report.verification.overall.confidence,
            if report.verification.overall.passed { "passed" } else { "failed" },
        );
        let entry = GovernanceEntry {
            timestamp: chrono::Utc::now(),
            event_type: "qa_result".to_string(),
            actor: ACTOR.to_string(),
            resource_id: anchor_id.unwrap_or(entry_id).to_string(),
            action: "qa_run_completed".to_string(),
            success: report.overall_success(),
            details: serde_json::json!({
                "entry_id": entry_id,
                "summary": summary,
                "environment": report.environment,
                "branch": report.branch_label,
                "artifact": report_path,
                "memory_anchor": anchor_id,
                "metrics": {
                    "total_tests": report.summary.total_tests,
                    "passed_tests": report.summary.passed_tests,
                    "failed_tests": report.summary.failed_tests,
                    "pass_rate": report.summary.pass_rate,
                    "confidence": report.verification.overall.confidence,
                },
                "test_suites": report.test_suites.keys().collect::<Vec<_>>(),
                "critical_issues": report.verification.critical_issue_count(),
                "verification_passed": report.verification.overall.passed,
            }),
            runtime_context: RuntimeContext::current(&report.environment),
        };
        self.append(&entry);
    }

    /// Record a fatal abort
    pub fn record_qa_failure(&self, environment: &str, error: &Error, phase: &str) {
        let entry = GovernanceEntry {
            timestamp: chrono::Utc::now(),
            event_type: "qa_failure".to_string(),
            actor: ACTOR.to_string(),
            resource_id: new_entry_id(),
            action: "qa_run_aborted".to_string(),
            success: false,
            details: serde_json::json!({
                "phase": phase,
                "error_kind": error.kind(),
                "error_message": error.to_string(),
            }),
            runtime_context: RuntimeContext::current(environment),
        };
        self.append(&entry);
    }

    /// Append one record as a JSON line; failures are warned and dropped
    pub fn append(&self, entry: &GovernanceEntry) {
        let Some(path) = &self.path else { return };

        let outcome = (|| -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let line = serde_json::to_string(entry).map_err(std::io::Error::other)?;
            let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{}", line)
        })();

        if let Err(e) = outcome {
            warn!("Governance write to {} failed: {}", path.display(), e);
        }
    }
}
