//! Pipeline orchestration
//!
//! Phase order: configuration, environment startup, browser launch,
//! suite execution, bundling, report artifacts, memory anchoring,
//! governance. A fatal error in the first three phases aborts the run
//! with a failure report and a governance record; everything after
//! execution degrades per artifact instead of aborting.

use crate::output;
use routeqa_common::config::{ArtifactSpec, EnvironmentConfig, RunConfig};
use routeqa_common::Error;
use routeqa_driver::{BrowserSession, EnvironmentHandle};
use routeqa_engine::executor::{ExecutorContext, RouteExecutor};
use routeqa_engine::report::{bundle, write_execution_summary, write_failure_report, write_report};
use routeqa_memory::governance::{self, GovernanceSink};
use routeqa_memory::AnchorStore;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

pub struct PipelineOptions {
    pub config_path: PathBuf,
    pub environment: String,
    pub branch_label: String,
    pub memory_enabled: bool,
    pub governance_enabled: bool,
}

/// Run the pipeline end to end; returns overall success
pub async fn run(options: &PipelineOptions) -> bool {
    let started = Instant::now();

    let config = match RunConfig::from_file(&options.config_path) {
        Ok(config) => config,
        Err(e) => {
            abort(None, options, &e, "configuration", started);
            return false;
        }
    };
    if let Err(e) = config.validate(&options.environment) {
        abort(Some(&config), options, &e, "configuration", started);
        return false;
    }

    let (env_config, screenshots, logs, reports) = match resolve(&config, &options.environment) {
        Ok(parts) => parts,
        Err(e) => {
            abort(Some(&config), options, &e, "configuration", started);
            return false;
        }
    };
    let verification = config.verification_config();

    info!(
        "Starting QA run: environment={} branch={} suites={}",
        options.environment,
        options.branch_label,
        config.enabled_suites().len()
    );

    let mut environment = match EnvironmentHandle::start(&env_config).await {
        Ok(handle) => handle,
        Err(e) => {
            abort(Some(&config), options, &e, "environment_startup", started);
            return false;
        }
    };

    let mut session = match BrowserSession::launch(&config.browser).await {
        Ok(session) => session,
        Err(e) => {
            environment.stop();
            abort(Some(&config), options, &e, "browser_launch", started);
            return false;
        }
    };
    let console = session.console();

    let executor = RouteExecutor::new(ExecutorContext {
        base_url: env_config.base_url.clone(),
        browser: config.browser.clone(),
        validation: verification.screenshot_analysis.clone(),
        screenshots,
        logs,
    });

    let mut suites = Vec::new();
    for suite in config.enabled_suites() {
        suites.push(executor.run_suite(&mut session, &console, &suite).await);
    }

    session.close().await;
    environment.stop();

    let entries = console.snapshot();
    let report = bundle(
        suites,
        &entries,
        &verification,
        &options.environment,
        &options.branch_label,
    );

    let report_path = match write_report(&report, &reports) {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("Report artifact not written: {}", e);
            None
        }
    };
    if let Err(e) = write_execution_summary(&report, &reports) {
        warn!("Execution summary not written: {}", e);
    }

    // The anchor links back to this governance entry, and the governance
    // entry names the anchor
    let entry_id = governance::new_entry_id();
    let anchor_id = if options.memory_enabled {
        // validate() guarantees the governance section exists
        config.governance.as_ref().and_then(|gov| {
            let store = AnchorStore::new(&gov.memory_anchors);
            match store.persist_run(
                &report,
                report_path.as_deref(),
                &env_config.base_url,
                Some(entry_id.clone()),
            ) {
                Ok(anchor) => Some(anchor.id),
                Err(e) => {
                    warn!("Memory anchoring failed: {}", e);
                    None
                }
            }
        })
    } else {
        info!("Memory anchoring skipped (--no-memory)");
        None
    };

    if options.governance_enabled {
        let report_path_str = report_path.as_ref().map(|p| p.to_string_lossy().to_string());
        GovernanceSink::new(config.governance.as_ref()).record_qa_result(
            &entry_id,
            &report,
            anchor_id.as_deref(),
            report_path_str.as_deref(),
        );
    }

    output::print_run_summary(&report, started.elapsed());
    report.overall_success()
}

/// Resolve everything the run needs up front so a bad document fails
/// before any process is spawned
fn resolve(
    config: &RunConfig,
    environment: &str,
) -> routeqa_common::Result<(EnvironmentConfig, ArtifactSpec, ArtifactSpec, ArtifactSpec)> {
    Ok((
        config.environment(environment)?.clone(),
        config.artifact_spec("screenshots")?.clone(),
        config.artifact_spec("logs")?.clone(),
        config.artifact_spec("reports")?.clone(),
    ))
}

/// Fatal-abort path: failure report, governance record, user-facing error
fn abort(
    config: Option<&RunConfig>,
    options: &PipelineOptions,
    error: &Error,
    phase: &str,
    started: Instant,
) {
    output::print_error(&format!("{} ({})", error, phase));

    let elapsed_ms = started.elapsed().as_millis() as u64;
    if let Err(e) = write_failure_report(config, &options.environment, error, phase, elapsed_ms) {
        warn!("Failure report not written: {}", e);
    }

    if options.governance_enabled {
        let sink = GovernanceSink::new(config.and_then(|c| c.governance.as_ref()));
        sink.record_qa_failure(&options.environment, error, phase);
    }
}
