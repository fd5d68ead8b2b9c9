//! Durable memory anchors
//!
//! An anchor is the searchable, immutable record of one run. The store
//! writes the anchor document, copies the run's artifacts into a bundle
//! with a checksummed manifest, and records the detailed session data.
//!
//! Layout under the configured base directory:
//!
//! ```text
//! anchors/<id>.json       the anchor document
//! bundles/<id>/           copied screenshots, logs, report, manifest
//! sessions/<id>.json      detailed session record
//! index.json              capped recency index (see `index`)
//! ```

use crate::index;
use routeqa_common::config::MemoryAnchorConfig;
use routeqa_common::types::{
    AnchorLinks, AnchorMetrics, AnchorStatus, AnchorVerification, BundleEntry, BundleManifest,
    ExecutionContext, MemoryAnchor, MemoryIndexEntry, PerformanceStats, QaReport, RouteTiming,
    SearchMetadata, SessionRecord, TrendPlaceholders,
};
use routeqa_common::{Error, Result, FRAMEWORK_TAGS, SEARCH_KEYWORDS, VERSION};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// Filesystem-backed anchor store
pub struct AnchorStore {
    base: PathBuf,
    version: String,
}

impl AnchorStore {
    pub fn new(config: &MemoryAnchorConfig) -> Self {
        Self { base: PathBuf::from(&config.base), version: config.version.clone() }
    }

    pub fn index_path(&self) -> PathBuf {
        self.base.join("index.json")
    }

    fn anchor_path(&self, id: &str) -> PathBuf {
        self.base.join("anchors").join(format!("{}.json", id))
    }

    fn bundle_dir(&self, id: &str) -> PathBuf {
        self.base.join("bundles").join(id)
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.base.join("sessions").join(format!("{}.json", id))
    }

    /// Persist the full memory record for a run: anchor document,
    /// artifact bundle, session data, and index entry.
    ///
    /// The anchor and session writes are required; artifact copies are
    /// best-effort and recorded in the bundle manifest either way.
    pub fn persist_run(
        &self,
        report: &QaReport,
        report_path: Option<&Path>,
        base_url: &str,
        governance_entry_id: Option<String>,
    ) -> Result<MemoryAnchor> {
        let anchor = self.create_anchor(report, governance_entry_id);
        self.write_anchor(&anchor)?;

        let manifest = self.store_artifacts(&anchor, report, report_path);
        if !manifest.skipped.is_empty() {
            warn!(
                "Bundle {} incomplete: {} artifact(s) skipped",
                anchor.id,
                manifest.skipped.len()
            );
        }

        self.store_session_data(&anchor, report, base_url)?;
        index::append(&self.index_path(), index_entry(&anchor, report))?;

        info!("Memory anchor {} stored under {}", anchor.id, self.base.display());
        Ok(anchor)
    }

    /// Build the anchor document for a report
    pub fn create_anchor(
        &self,
        report: &QaReport,
        governance_entry_id: Option<String>,
    ) -> MemoryAnchor {
        let id = new_anchor_id(report.timestamp.timestamp_millis());
        let status =
            if report.overall_success() { AnchorStatus::Passed } else { AnchorStatus::Failed };

        let suites: Vec<String> = report.test_suites.keys().cloned().collect();

        let mut tags: Vec<String> = FRAMEWORK_TAGS.iter().map(|t| t.to_string()).collect();
        tags.extend(suites.iter().cloned());
        tags.push(report.branch_label.clone());
        tags.push(report.environment.clone());
        tags.push(format!("v{}", self.version));

        // Union across suites; a route shared by two suites appears once
        let routes_tested: Vec<String> = report
            .test_suites
            .values()
            .flat_map(|s| s.routes.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let issue_types: Vec<String> = report
            .verification
            .screenshots
            .issues
            .iter()
            .map(|i| i.issue_type.as_str().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut keywords: Vec<String> = SEARCH_KEYWORDS.iter().map(|k| k.to_string()).collect();
        keywords.push(status.to_string());

        let critical_issues = report.verification.critical_issue_count();

        MemoryAnchor {
            timestamp: report.timestamp,
            status,
            metrics: AnchorMetrics {
                total_tests: report.summary.total_tests,
                passed_tests: report.summary.passed_tests,
                failed_tests: report.summary.failed_tests,
                pass_rate: report.summary.pass_rate,
                confidence: report.verification.overall.confidence,
            },
            test_suites: suites,
            verification: AnchorVerification {
                passed: report.verification.overall.passed,
                confidence: report.verification.overall.confidence,
                critical_issues,
            },
            links: AnchorLinks {
                governance_entry_id,
                artifact_bundle_path: self.bundle_dir(&id).to_string_lossy().to_string(),
                session_data_path: self.session_path(&id).to_string_lossy().to_string(),
            },
            memory_tags: tags,
            search_metadata: SearchMetadata { routes_tested, issue_types, keywords },
            id,
        }
    }

    fn write_anchor(&self, anchor: &MemoryAnchor) -> Result<()> {
        let path = self.anchor_path(&anchor.id);
        write_json(&path, anchor)
    }

    /// Copy the run's artifacts into the anchor bundle.
    ///
    /// Individual copy failures never abort the run; they are listed in
    /// the manifest's `skipped` section instead.
    pub fn store_artifacts(
        &self,
        anchor: &MemoryAnchor,
        report: &QaReport,
        report_path: Option<&Path>,
    ) -> BundleManifest {
        let bundle = self.bundle_dir(&anchor.id);
        let mut manifest = BundleManifest { anchor_id: anchor.id.clone(), ..Default::default() };

        for (subdir, sources) in [
            ("screenshots", &report.artifacts.screenshots),
            ("logs", &report.artifacts.logs),
        ] {
            for source in sources {
                copy_into_bundle(&bundle.join(subdir), Path::new(source), &mut manifest);
            }
        }
        if let Some(path) = report_path {
            copy_into_bundle(&bundle, path, &mut manifest);
        }

        if let Err(e) = write_json(&bundle.join("manifest.json"), &manifest) {
            warn!("Cannot write bundle manifest for {}: {}", anchor.id, e);
        }
        manifest
    }

    /// Write the detailed session record next to the anchor
    pub fn store_session_data(
        &self,
        anchor: &MemoryAnchor,
        report: &QaReport,
        base_url: &str,
    ) -> Result<()> {
        let record = SessionRecord {
            anchor_id: anchor.id.clone(),
            execution_context: ExecutionContext {
                environment: report.environment.clone(),
                base_url: base_url.to_string(),
                branch_label: report.branch_label.clone(),
                pipeline_version: VERSION.to_string(),
            },
            detailed_results: report.test_suites.clone(),
            performance: performance_stats(report),
            error_analysis: error_analysis(report),
            trend: TrendPlaceholders::default(),
        };
        write_json(&self.session_path(&anchor.id), &record)
    }
}

/// `qa-<epoch-millis>-<short-uuid>`
fn new_anchor_id(timestamp_ms: i64) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("qa-{}-{}", timestamp_ms, &uuid[..8])
}

fn index_entry(anchor: &MemoryAnchor, report: &QaReport) -> MemoryIndexEntry {
    MemoryIndexEntry {
        id: anchor.id.clone(),
        timestamp_ms: anchor.timestamp.timestamp_millis(),
        status: anchor.status,
        branch: report.branch_label.clone(),
        environment: report.environment.clone(),
        pass_rate: report.summary.pass_rate,
        confidence: report.verification.overall.confidence,
        tags: anchor.memory_tags.clone(),
        search_keywords: anchor.search_metadata.keywords.clone(),
    }
}

/// Route timing statistics over routes that completed validation
fn performance_stats(report: &QaReport) -> PerformanceStats {
    let timings: Vec<RouteTiming> = report
        .test_suites
        .values()
        .flat_map(|s| s.routes.values())
        .filter_map(|r| {
            r.validation.as_ref().map(|v| RouteTiming {
                route: r.route.clone(),
                load_time_ms: v.load_time_ms,
            })
        })
        .collect();

    if timings.is_empty() {
        return PerformanceStats::default();
    }

    let total: u64 = timings.iter().map(|t| t.load_time_ms).sum();
    let avg = total as f64 / timings.len() as f64;
    let slowest = timings.iter().max_by_key(|t| t.load_time_ms).cloned();
    let fastest = timings.iter().min_by_key(|t| t.load_time_ms).cloned();

    PerformanceStats { avg_route_time_ms: avg, slowest_route: slowest, fastest_route: fastest }
}

/// Frequency of error "type" prefixes across the critical console errors,
/// e.g. `TypeError: x is null` counts under `TypeError`
fn error_analysis(report: &QaReport) -> BTreeMap<String, usize> {
    let mut analysis = BTreeMap::new();
    for entry in &report.verification.console.critical_errors {
        let prefix = entry
            .text
            .split_once(':')
            .map(|(head, _)| head.trim())
            .filter(|head| !head.is_empty())
            .unwrap_or("other");
        *analysis.entry(prefix.to_string()).or_insert(0) += 1;
    }
    analysis
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::ArtifactWrite(format!("{}: {}", parent.display(), e)))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
        .map_err(|e| Error::ArtifactWrite(format!("{}: {}", path.display(), e)))?;
    Ok(())
}

/// Copy one file into the bundle, hashing its content for the manifest
fn copy_into_bundle(dest_dir: &Path, source: &Path, manifest: &mut BundleManifest) {
    let outcome = (|| -> std::io::Result<BundleEntry> {
        std::fs::create_dir_all(dest_dir)?;
        let filename = source
            .file_name()
            .ok_or_else(|| std::io::Error::other("source has no filename"))?;
        let dest = dest_dir.join(filename);

        let content = std::fs::read(source)?;
        std::fs::write(&dest, &content)?;

        let mut hasher = Sha256::new();
        hasher.update(&content);
        Ok(BundleEntry {
            path: dest.to_string_lossy().to_string(),
            size: content.len() as u64,
            sha256: hex::encode(hasher.finalize()),
        })
    })();

    match outcome {
        Ok(entry) => manifest.entries.push(entry),
        Err(e) => {
            warn!("Cannot bundle {}: {}", source.display(), e);
            manifest.skipped.push(source.to_string_lossy().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use routeqa_common::types::{
        ArtifactIndex, ConsoleAnalysis, ConsoleLevel, ConsoleLogEntry, OverallVerdict,
        RouteStatus, RouteTestResult, RouteValidationResult, RunSummary, ScreenshotAnalysis,
        SuiteResult, VerificationReport,
    };

    fn sample_report(pass_rate: f64, verification_passed: bool) -> QaReport {
        let mut suite = SuiteResult::new("core", "Core routes");
        for (route, ms) in [("/", 800u64), ("/dashboard", 2400), ("/settings", 1200)] {
            suite.push(RouteTestResult {
                route: route.to_string(),
                status: RouteStatus::Passed,
                timestamp: chrono::Utc::now(),
                screenshot_path: None,
                log_path: None,
                console_error_count: 0,
                validation: Some(RouteValidationResult {
                    has_title: true,
                    load_time_ms: ms,
                    ..Default::default()
                }),
                error: None,
            });
        }
        let mut test_suites = IndexMap::new();
        test_suites.insert("core".to_string(), suite);

        QaReport {
            timestamp: chrono::Utc::now(),
            branch_label: "main".to_string(),
            environment: "development".to_string(),
            test_suites,
            artifacts: ArtifactIndex::default(),
            summary: RunSummary {
                total_tests: 3,
                passed_tests: 3,
                failed_tests: 0,
                pass_rate,
            },
            verification: VerificationReport {
                overall: OverallVerdict { passed: verification_passed, confidence: 90 },
                console: ConsoleAnalysis::default(),
                screenshots: ScreenshotAnalysis::default(),
                recommendations: vec![],
            },
        }
    }

    fn store(base: &Path) -> AnchorStore {
        AnchorStore::new(&MemoryAnchorConfig {
            base: base.to_string_lossy().to_string(),
            version: "1".to_string(),
        })
    }

    #[test]
    fn test_persist_run_writes_all_records() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let report = sample_report(100.0, true);

        let anchor = store
            .persist_run(&report, None, "http://localhost:3000", Some("gov-1".to_string()))
            .unwrap();

        assert_eq!(anchor.status, AnchorStatus::Passed);
        assert!(anchor.id.starts_with("qa-"));
        assert!(store.anchor_path(&anchor.id).exists());
        assert!(store.session_path(&anchor.id).exists());
        assert!(store.bundle_dir(&anchor.id).join("manifest.json").exists());

        let entries = index::load(&store.index_path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, anchor.id);
        assert_eq!(entries[0].pass_rate, 100.0);
    }

    #[test]
    fn test_anchor_tags_and_search_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let report = sample_report(100.0, true);

        let anchor = store.create_anchor(&report, None);

        for tag in ["qa", "core", "main", "development", "v1"] {
            assert!(anchor.memory_tags.iter().any(|t| t == tag), "missing tag {}", tag);
        }
        assert_eq!(
            anchor.search_metadata.routes_tested,
            vec!["/", "/dashboard", "/settings"]
        );
        assert!(anchor.search_metadata.keywords.iter().any(|k| k == "passed"));
    }

    #[test]
    fn test_routes_tested_is_a_union_across_suites() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());

        let mut report = sample_report(100.0, true);
        // A second suite revisits /dashboard
        let mut smoke = SuiteResult::new("smoke", "Smoke checks");
        smoke.push(RouteTestResult {
            route: "/dashboard".to_string(),
            status: RouteStatus::Passed,
            timestamp: chrono::Utc::now(),
            screenshot_path: None,
            log_path: None,
            console_error_count: 0,
            validation: Some(RouteValidationResult::default()),
            error: None,
        });
        report.test_suites.insert("smoke".to_string(), smoke);

        let anchor = store.create_anchor(&report, None);
        assert_eq!(
            anchor.search_metadata.routes_tested,
            vec!["/", "/dashboard", "/settings"]
        );
    }

    #[test]
    fn test_failed_run_anchors_as_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        // Verification failed, so the run fails regardless of pass rate
        let anchor = store.create_anchor(&sample_report(100.0, false), None);
        assert_eq!(anchor.status, AnchorStatus::Failed);
        assert!(anchor.search_metadata.keywords.iter().any(|k| k == "failed"));
    }

    #[test]
    fn test_bundle_checksums_and_skips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp.path().join("memory"));

        let shot = tmp.path().join("home.png");
        std::fs::write(&shot, b"pixels").unwrap();

        let mut report = sample_report(100.0, true);
        report.artifacts.screenshots = vec![
            shot.to_string_lossy().to_string(),
            tmp.path().join("missing.png").to_string_lossy().to_string(),
        ];

        let anchor = store.create_anchor(&report, None);
        let manifest = store.store_artifacts(&anchor, &report, None);

        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].size, 6);
        // sha256 of "pixels"
        assert_eq!(manifest.entries[0].sha256.len(), 64);
        assert_eq!(manifest.skipped.len(), 1);
        assert!(Path::new(&manifest.entries[0].path).exists());
    }

    #[test]
    fn test_session_record_performance_and_error_analysis() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let mut report = sample_report(100.0, true);
        report.verification.console.critical_errors = vec![
            ConsoleLogEntry {
                timestamp_ms: 1,
                level: ConsoleLevel::Error,
                text: "TypeError: x is null".to_string(),
                source_url: "http://localhost:3000/".to_string(),
            },
            ConsoleLogEntry {
                timestamp_ms: 2,
                level: ConsoleLevel::PageError,
                text: "TypeError: y is undefined".to_string(),
                source_url: "http://localhost:3000/dashboard".to_string(),
            },
            ConsoleLogEntry {
                timestamp_ms: 3,
                level: ConsoleLevel::Error,
                text: "Failed to fetch".to_string(),
                source_url: "http://localhost:3000/settings".to_string(),
            },
        ];

        let anchor = store.create_anchor(&report, None);
        store.store_session_data(&anchor, &report, "http://localhost:3000").unwrap();

        let record: SessionRecord = serde_json::from_str(
            &std::fs::read_to_string(store.session_path(&anchor.id)).unwrap(),
        )
        .unwrap();

        assert_eq!(record.anchor_id, anchor.id);
        assert_eq!(record.performance.slowest_route.as_ref().unwrap().route, "/dashboard");
        assert_eq!(record.performance.fastest_route.as_ref().unwrap().route, "/");
        let expected_avg = (800.0 + 2400.0 + 1200.0) / 3.0;
        assert!((record.performance.avg_route_time_ms - expected_avg).abs() < 1e-9);

        assert_eq!(record.error_analysis.get("TypeError"), Some(&2));
        assert_eq!(record.error_analysis.get("other"), Some(&1));
    }
}
