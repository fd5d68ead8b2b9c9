//! Heuristic verification engine
//!
//! A pure function of the captured console stream and the route results.
//! No clocks, no randomness: identical inputs always produce an identical
//! report, so the scoring stays auditable and testable.

use routeqa_common::config::VerificationConfig;
use routeqa_common::types::{
    ConsoleAnalysis, ConsoleLevel, ConsoleLogEntry, IssueType, OverallVerdict, Priority,
    Recommendation, RouteTestResult, ScreenshotAnalysis, Severity, ValidationIssue,
    VerificationReport,
};
use std::collections::BTreeSet;

// Linear penalty weights; the mapping from issues to the confidence
// number is deliberately a flat, inspectable list.
const PENALTY_CRITICAL_ERROR: i32 = 20;
const PENALTY_WARNING: i32 = 5;
const PENALTY_BLANK_DASHBOARD: i32 = 25;
const PENALTY_ERROR_BANNER: i32 = 20;
const PENALTY_SIDEBAR_ISSUE: i32 = 10;

/// Analyze one run's evidence into a verification report.
pub fn verify(
    entries: &[ConsoleLogEntry],
    results: &[RouteTestResult],
    config: &VerificationConfig,
) -> VerificationReport {
    let console = analyze_console(entries, config);
    let screenshots = analyze_validations(results, config);

    let blank_count = count_issues(&screenshots.issues, IssueType::BlankDashboard);
    let banner_count = count_issues(&screenshots.issues, IssueType::ErrorBanner);
    let sidebar_count = count_issues(&screenshots.issues, IssueType::SidebarIssue);

    let mut confidence: i32 = 100;
    confidence -= PENALTY_CRITICAL_ERROR * console.critical_error_count as i32;
    confidence -= PENALTY_WARNING * console.warning_count as i32;
    confidence -= PENALTY_BLANK_DASHBOARD * blank_count as i32;
    confidence -= PENALTY_ERROR_BANNER * banner_count as i32;
    confidence -= PENALTY_SIDEBAR_ISSUE * sidebar_count as i32;
    let confidence = confidence.clamp(0, 100) as u8;

    let has_high_severity = screenshots.issues.iter().any(|i| i.severity == Severity::High);
    let issue_route_fraction = issue_route_fraction(&screenshots.issues, results.len());
    let passed = console.critical_error_count == 0
        && !has_high_severity
        && issue_route_fraction <= 0.5;

    let recommendations =
        build_recommendations(&console, &screenshots, confidence, config.confidence_threshold);

    VerificationReport {
        overall: OverallVerdict { passed, confidence },
        console,
        screenshots,
        recommendations,
    }
}

/// Classify console entries against the ordered pattern rules
fn analyze_console(entries: &[ConsoleLogEntry], config: &VerificationConfig) -> ConsoleAnalysis {
    let rules = &config.console_analysis;
    let mut critical_errors = Vec::new();
    let mut warnings = Vec::new();
    let mut error_count = 0usize;

    for entry in entries {
        if entry.level == ConsoleLevel::Error {
            error_count += 1;
        }
        if rules.critical_error_patterns.iter().any(|p| entry.text.contains(p.as_str())) {
            critical_errors.push(entry.clone());
        } else if entry.level == ConsoleLevel::Warn
            || rules.warning_patterns.iter().any(|p| entry.text.contains(p.as_str()))
        {
            warnings.push(entry.clone());
        }
    }

    let summary = format!(
        "{} critical, {} warnings, {} errors across {} console entries",
        critical_errors.len(),
        warnings.len(),
        error_count,
        entries.len()
    );

    ConsoleAnalysis {
        critical_error_count: critical_errors.len(),
        warning_count: warnings.len(),
        critical_errors,
        warnings,
        error_count,
        summary,
    }
}

/// Raise issues from each route's validation block
fn analyze_validations(
    results: &[RouteTestResult],
    config: &VerificationConfig,
) -> ScreenshotAnalysis {
    let thresholds = &config.screenshot_analysis;
    let mut issues = Vec::new();

    for result in results {
        let validation = match &result.validation {
            Some(v) => v,
            None => continue,
        };

        if validation.is_blank_dashboard {
            issues.push(ValidationIssue {
                route: result.route.clone(),
                issue_type: IssueType::BlankDashboard,
                severity: Severity::High,
                detail: "no content-bearing elements rendered".to_string(),
            });
        }
        if validation.has_error_banner {
            issues.push(ValidationIssue {
                route: result.route.clone(),
                issue_type: IssueType::ErrorBanner,
                severity: Severity::High,
                detail: "page shows an error indicator".to_string(),
            });
        }
        if validation.sidebar_visible && validation.sidebar_width_px < thresholds.min_sidebar_width
        {
            issues.push(ValidationIssue {
                route: result.route.clone(),
                issue_type: IssueType::SidebarIssue,
                severity: Severity::Medium,
                detail: format!(
                    "sidebar width {:.0}px below minimum {:.0}px",
                    validation.sidebar_width_px, thresholds.min_sidebar_width
                ),
            });
        }
        if validation.load_time_ms > thresholds.max_load_time_ms {
            issues.push(ValidationIssue {
                route: result.route.clone(),
                issue_type: IssueType::SlowLoad,
                severity: Severity::Medium,
                detail: format!(
                    "loaded in {}ms, above maximum {}ms",
                    validation.load_time_ms, thresholds.max_load_time_ms
                ),
            });
        }
    }

    let summary = format!("{} issues across {} routes", issues.len(), results.len());
    ScreenshotAnalysis { issues, summary }
}

fn count_issues(issues: &[ValidationIssue], kind: IssueType) -> usize {
    issues.iter().filter(|i| i.issue_type == kind).count()
}

/// Fraction of tested routes that raised at least one issue
fn issue_route_fraction(issues: &[ValidationIssue], route_count: usize) -> f64 {
    if route_count == 0 {
        return 0.0;
    }
    let affected: BTreeSet<&str> = issues.iter().map(|i| i.route.as_str()).collect();
    affected.len() as f64 / route_count as f64
}

/// One recommendation per present category, in a fixed order
fn build_recommendations(
    console: &ConsoleAnalysis,
    screenshots: &ScreenshotAnalysis,
    confidence: u8,
    confidence_threshold: u8,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if console.critical_error_count > 0 {
        recommendations.push(Recommendation {
            priority: Priority::High,
            category: "critical_console_errors".to_string(),
            message: format!(
                "Fix {} critical console error(s) matching configured patterns",
                console.critical_error_count
            ),
            details: console.critical_errors.iter().map(|e| e.text.clone()).collect(),
        });
    }

    for (kind, priority, message) in [
        (
            IssueType::BlankDashboard,
            Priority::High,
            "Investigate routes rendering with no content",
        ),
        (
            IssueType::ErrorBanner,
            Priority::High,
            "Remove visible error indicators from affected routes",
        ),
        (
            IssueType::SidebarIssue,
            Priority::Medium,
            "Check sidebar layout on affected routes",
        ),
        (
            IssueType::SlowLoad,
            Priority::Medium,
            "Profile slow-loading routes",
        ),
    ] {
        let details: Vec<String> = screenshots
            .issues
            .iter()
            .filter(|i| i.issue_type == kind)
            .map(|i| format!("{}: {}", i.route, i.detail))
            .collect();
        if !details.is_empty() {
            recommendations.push(Recommendation {
                priority,
                category: kind.as_str().to_string(),
                message: message.to_string(),
                details,
            });
        }
    }

    if console.warning_count > 0 {
        recommendations.push(Recommendation {
            priority: Priority::Medium,
            category: "console_warnings".to_string(),
            message: format!("Review {} console warning(s)", console.warning_count),
            details: console.warnings.iter().map(|e| e.text.clone()).collect(),
        });
    }

    if confidence < confidence_threshold {
        recommendations.push(Recommendation {
            priority: Priority::High,
            category: "low_confidence".to_string(),
            message: format!(
                "Confidence {} is below the configured threshold {}",
                confidence, confidence_threshold
            ),
            details: vec![format!(
                "{} critical, {} warnings, {} visual issue(s) contributed penalties",
                console.critical_error_count,
                console.warning_count,
                screenshots.issues.len()
            )],
        });
    }

    recommendations
}
