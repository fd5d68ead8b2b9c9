//! Run-level report bundling and report artifacts
//!
//! The QA report is the unit of record for a run: suite results, the
//! flattened artifact index, the run summary, and the verification
//! report, assembled once and never mutated afterwards.

use crate::verify::verify;
use routeqa_common::config::{render_template, ArtifactSpec, RunConfig, VerificationConfig};
use routeqa_common::types::{
    ArtifactIndex, ConsoleLogEntry, ExecutionSummary, FailureReport, QaReport, RunSummary,
    SuiteResult,
};
use routeqa_common::{Error, Result};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Assemble the run report from suite results and the console stream.
///
/// Verification runs exactly once here, over the full evidence of the run.
pub fn bundle(
    suites: Vec<SuiteResult>,
    entries: &[ConsoleLogEntry],
    verification_config: &VerificationConfig,
    environment: &str,
    branch_label: &str,
) -> QaReport {
    let all_results: Vec<_> =
        suites.iter().flat_map(|s| s.routes.values().cloned()).collect();

    let verification = verify(entries, &all_results, verification_config);
    let artifacts = flatten_artifacts(&suites);
    let summary = run_summary(&suites);

    let test_suites: IndexMap<String, SuiteResult> =
        suites.into_iter().map(|s| (s.name.clone(), s)).collect();

    QaReport {
        timestamp: chrono::Utc::now(),
        branch_label: branch_label.to_string(),
        environment: environment.to_string(),
        test_suites,
        artifacts,
        summary,
        verification,
    }
}

/// Tally all suites into the run summary.
///
/// `pass_rate` is a percentage rounded to one decimal, and 0.0 for an
/// empty run rather than NaN.
fn run_summary(suites: &[SuiteResult]) -> RunSummary {
    let total: usize = suites.iter().map(|s| s.summary.total).sum();
    let passed: usize = suites.iter().map(|s| s.summary.passed).sum();
    let failed: usize = suites.iter().map(|s| s.summary.failed).sum();

    let pass_rate = if total == 0 {
        0.0
    } else {
        (passed as f64 / total as f64 * 1000.0).round() / 10.0
    };

    RunSummary { total_tests: total, passed_tests: passed, failed_tests: failed, pass_rate }
}

/// Collect every artifact path across suites, in execution order
fn flatten_artifacts(suites: &[SuiteResult]) -> ArtifactIndex {
    let mut index = ArtifactIndex::default();
    for suite in suites {
        for result in suite.routes.values() {
            if let Some(path) = &result.screenshot_path {
                index.screenshots.push(path.clone());
            }
            if let Some(path) = &result.log_path {
                index.logs.push(path.clone());
            }
        }
    }
    index
}

/// Write the full report artifact, returning its path
pub fn write_report(report: &QaReport, spec: &ArtifactSpec) -> Result<PathBuf> {
    let dir = Path::new(&spec.path);
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::ArtifactWrite(format!("report dir: {}", e)))?;

    let filename = render_template(&spec.format, "report", report.timestamp.timestamp_millis());
    let path = dir.join(filename);
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)
        .map_err(|e| Error::ArtifactWrite(format!("{}: {}", path.display(), e)))?;

    info!("Report written to {}", path.display());
    Ok(path)
}

/// Write the condensed execution summary next to the full report
pub fn write_execution_summary(report: &QaReport, spec: &ArtifactSpec) -> Result<PathBuf> {
    let summary = ExecutionSummary {
        timestamp: report.timestamp,
        environment: report.environment.clone(),
        branch_label: report.branch_label.clone(),
        total_tests: report.summary.total_tests,
        passed_tests: report.summary.passed_tests,
        failed_tests: report.summary.failed_tests,
        pass_rate: report.summary.pass_rate,
        confidence: report.verification.overall.confidence,
        verification_passed: report.verification.overall.passed,
        overall_success: report.overall_success(),
        suites: report.test_suites.keys().cloned().collect(),
    };

    let dir = Path::new(&spec.path);
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::ArtifactWrite(format!("report dir: {}", e)))?;
    let path = dir.join("qa-execution-summary.json");
    std::fs::write(&path, serde_json::to_string_pretty(&summary)?)
        .map_err(|e| Error::ArtifactWrite(format!("{}: {}", path.display(), e)))?;
    Ok(path)
}

const FALLBACK_REPORT_DIR: &str = "qa-artifacts/reports";

/// Write a failure report on fatal abort.
///
/// Works even before configuration has loaded; the report then lands in
/// the default reports directory.
pub fn write_failure_report(
    config: Option<&RunConfig>,
    environment: &str,
    error: &Error,
    phase: &str,
    elapsed_ms: u64,
) -> Result<PathBuf> {
    let report = FailureReport {
        timestamp: chrono::Utc::now(),
        environment: environment.to_string(),
        error_kind: error.kind().to_string(),
        error_message: error.to_string(),
        phase: phase.to_string(),
        elapsed_ms,
    };

    let dir: PathBuf = config
        .and_then(|c| c.artifact_spec("reports").ok())
        .map(|spec| PathBuf::from(&spec.path))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_REPORT_DIR));

    std::fs::create_dir_all(&dir)
        .map_err(|e| Error::ArtifactWrite(format!("report dir: {}", e)))?;
    let path = dir.join(format!(
        "qa-failure-report-{}.json",
        report.timestamp.timestamp_millis()
    ));
    std::fs::write(&path, serde_json::to_string_pretty(&report)?)
        .map_err(|e| Error::ArtifactWrite(format!("{}: {}", path.display(), e)))?;

    info!("Failure report written to {}", path.display());
    Ok(path)
}
