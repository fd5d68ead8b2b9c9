//! Terminal output for the pipeline run

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use routeqa_common::types::{Priority, QaReport, RouteStatus};
use std::time::Duration;

/// Print the end-of-run summary: per-suite results, verification
/// verdict, and recommendations
pub fn print_run_summary(report: &QaReport, elapsed: Duration) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Suite", "Route", "Status", "Console Errors", "Load (ms)"]);

    for suite in report.test_suites.values() {
        for result in suite.routes.values() {
            let status = match result.status {
                RouteStatus::Passed => "PASSED".green().to_string(),
                RouteStatus::Failed => "FAILED".red().to_string(),
            };
            let load = result
                .validation
                .as_ref()
                .map(|v| v.load_time_ms.to_string())
                .unwrap_or_else(|| "-".to_string());
            table.add_row(vec![
                suite.name.clone(),
                result.route.clone(),
                status,
                result.console_error_count.to_string(),
                load,
            ]);
        }
    }
    println!("{table}");

    println!();
    println!(
        "Tests: {} passed, {} failed, {} total ({:.1}%)",
        report.summary.passed_tests.to_string().green(),
        report.summary.failed_tests.to_string().red(),
        report.summary.total_tests,
        report.summary.pass_rate
    );

    let verdict = if report.verification.overall.passed {
        "PASSED".green().bold()
    } else {
        "FAILED".red().bold()
    };
    println!(
        "Verification: {} (confidence {}/100, {} critical, {} warnings, {} visual issues)",
        verdict,
        report.verification.overall.confidence,
        report.verification.console.critical_error_count,
        report.verification.console.warning_count,
        report.verification.screenshots.issues.len()
    );

    if !report.verification.recommendations.is_empty() {
        println!();
        println!("Recommendations:");
        for rec in &report.verification.recommendations {
            let priority = match rec.priority {
                Priority::High => "high".red().to_string(),
                Priority::Medium => "medium".yellow().to_string(),
            };
            println!("  [{}] {}: {}", priority, rec.category, rec.message);
        }
    }

    println!();
    if report.overall_success() {
        print_success(&format!("QA run succeeded in {:.1}s", elapsed.as_secs_f64()));
    } else {
        print_error(&format!("QA run failed after {:.1}s", elapsed.as_secs_f64()));
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}
