//! Route test executor
//!
//! Drives the browser session across a suite's routes, strictly
//! sequentially: console attribution matches log entries to routes by
//! capture-time URL, which requires that routes never overlap.

use crate::validate::run_validation;
use routeqa_common::config::{
    render_template, ArtifactSpec, BrowserConfig, ScreenshotAnalysisConfig, TestSuiteConfig,
};
use routeqa_common::types::{
    ConsoleLevel, ConsoleLogEntry, RouteStatus, RouteTestResult, SuiteResult,
};
use routeqa_common::{Error, Result};
use routeqa_driver::console::{filter_by_route, ConsoleBuffer};
use routeqa_driver::session::PageDriver;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Run-scoped settings the executor needs per route
#[derive(Debug, Clone)]
pub struct ExecutorContext {
    pub base_url: String,
    pub browser: BrowserConfig,
    pub validation: ScreenshotAnalysisConfig,
    pub screenshots: ArtifactSpec,
    pub logs: ArtifactSpec,
}

/// Sequential route executor
pub struct RouteExecutor {
    context: ExecutorContext,
}

impl RouteExecutor {
    pub fn new(context: ExecutorContext) -> Self {
        Self { context }
    }

    /// Execute every route in a suite, in declaration order.
    ///
    /// A route failure is never fatal to the suite: the error is captured
    /// in that route's result and execution continues.
    pub async fn run_suite<D: PageDriver>(
        &self,
        driver: &mut D,
        console: &ConsoleBuffer,
        suite: &TestSuiteConfig,
    ) -> SuiteResult {
        let mut suite_result = SuiteResult::new(&suite.name, &suite.description);
        info!("Suite '{}': {} route(s)", suite.name, suite.routes.len());

        for route in &suite.routes {
            let result = self.run_route(driver, console, suite, route).await;
            match result.status {
                RouteStatus::Passed => info!("  PASSED {}", route),
                RouteStatus::Failed => {
                    error!("  FAILED {} - {}", route, result.error.as_deref().unwrap_or("?"))
                }
            }
            suite_result.push(result);
        }

        info!(
            "Suite '{}' done: {}/{} passed",
            suite.name, suite_result.summary.passed, suite_result.summary.total
        );
        suite_result
    }

    /// Execute one route end to end
    async fn run_route<D: PageDriver>(
        &self,
        driver: &mut D,
        console: &ConsoleBuffer,
        suite: &TestSuiteConfig,
        route: &str,
    ) -> RouteTestResult {
        let started = Instant::now();
        let timestamp = chrono::Utc::now();
        let timestamp_ms = timestamp.timestamp_millis();
        let url = join_url(&self.context.base_url, route);
        let timeout_ms = suite.timeout_ms.unwrap_or(self.context.browser.timeout_ms);

        let mut failure: Option<Error> = None;
        let mut screenshot_path = None;

        if let Err(e) = driver.navigate(&url, timeout_ms).await {
            failure = Some(e);
        } else {
            // Let the page settle before capture and validation
            if self.context.browser.settle_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.context.browser.settle_delay_ms))
                    .await;
            }

            match self.capture_screenshot(driver, suite, route, timestamp_ms).await {
                Ok(path) => screenshot_path = Some(path),
                Err(e) => failure = Some(e),
            }
        }

        // Route-scoped console slice; collected even for failed routes so
        // the evidence survives
        let route_entries = filter_by_route(&console.snapshot(), &self.context.base_url, route);
        let console_error_count = route_entries
            .iter()
            .filter(|e| matches!(e.level, ConsoleLevel::Error | ConsoleLevel::PageError))
            .count();
        let log_path = self.write_route_log(route, timestamp_ms, &route_entries);

        if let Some(e) = failure {
            return RouteTestResult {
                route: route.to_string(),
                status: RouteStatus::Failed,
                timestamp,
                screenshot_path: None,
                log_path,
                console_error_count,
                validation: None,
                error: Some(e.to_string()),
            };
        }

        let validation =
            run_validation(driver, &self.context.validation, started.elapsed().as_millis() as u64)
                .await;

        RouteTestResult {
            route: route.to_string(),
            status: RouteStatus::Passed,
            timestamp,
            screenshot_path: screenshot_path.map(|p| p.to_string_lossy().to_string()),
            log_path,
            console_error_count,
            validation: Some(validation),
            error: None,
        }
    }

    /// Capture the route screenshot at its templated path
    async fn capture_screenshot<D: PageDriver>(
        &self,
        driver: &mut D,
        suite: &TestSuiteConfig,
        route: &str,
        timestamp_ms: i64,
    ) -> Result<PathBuf> {
        let dir = Path::new(&self.context.screenshots.path);
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::ArtifactWrite(format!("screenshot dir: {}", e)))?;
        let filename = render_template(&self.context.screenshots.format, route, timestamp_ms);
        let path = dir.join(filename);

        let full_page = suite
            .screenshot_options
            .map(|o| o.full_page)
            .unwrap_or(false);
        driver.screenshot(&path, full_page).await?;
        Ok(path)
    }

    /// Write the route-scoped console log artifact; failures are logged
    /// and the artifact is omitted, never failing the route
    fn write_route_log(
        &self,
        route: &str,
        timestamp_ms: i64,
        entries: &[ConsoleLogEntry],
    ) -> Option<String> {
        let dir = Path::new(&self.context.logs.path);
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("Cannot create log dir {}: {}", dir.display(), e);
            return None;
        }
        let filename = render_template(&self.context.logs.format, route, timestamp_ms);
        let path = dir.join(filename);

        let mut content: String =
            entries.iter().map(|e| e.to_log_line() + "\n").collect();
        if content.is_empty() {
            content = format!("(no console output captured for {})\n", route);
        }

        match std::fs::write(&path, content) {
            Ok(()) => Some(path.to_string_lossy().to_string()),
            Err(e) => {
                warn!("Cannot write log artifact {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Join a base URL and a route path without doubling slashes
pub fn join_url(base_url: &str, route: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), route.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use routeqa_common::config::{ScreenshotOptions, Viewport};
    use routeqa_driver::agent::ElementBox;
    use std::collections::HashSet;

    /// Scripted driver: configured routes fail navigation; everything
    /// else renders a healthy page and logs one console line
    struct MockDriver {
        console: ConsoleBuffer,
        failing_routes: HashSet<String>,
        current_url: String,
        navigations: Vec<String>,
    }

    impl MockDriver {
        fn new(console: ConsoleBuffer) -> Self {
            Self {
                console,
                failing_routes: HashSet::new(),
                current_url: String::new(),
                navigations: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl PageDriver for MockDriver {
        async fn navigate(&mut self, url: &str, timeout_ms: u64) -> routeqa_common::Result<()> {
            self.navigations.push(url.to_string());
            if self.failing_routes.iter().any(|r| url.ends_with(r.as_str())) {
                return Err(Error::RouteTimeout { route: url.to_string(), ms: timeout_ms });
            }
            self.current_url = url.to_string();
            self.console.push(ConsoleLogEntry {
                timestamp_ms: 1,
                level: ConsoleLevel::Log,
                text: format!("loaded {}", url),
                source_url: url.to_string(),
            });
            Ok(())
        }

        async fn screenshot(&mut self, path: &Path, _full_page: bool) -> routeqa_common::Result<()> {
            std::fs::write(path, b"png").map_err(|e| Error::ArtifactWrite(e.to_string()))
        }

        async fn query_box(&mut self, _selector: &str) -> routeqa_common::Result<Option<ElementBox>> {
            Ok(Some(ElementBox { x: 0.0, y: 0.0, width: 240.0, height: 800.0 }))
        }

        async fn count_elements(&mut self, _selector: &str) -> routeqa_common::Result<u64> {
            Ok(12)
        }

        async fn page_title(&mut self) -> routeqa_common::Result<String> {
            Ok("Dashboard".to_string())
        }

        async fn body_text(&mut self) -> routeqa_common::Result<String> {
            Ok("Welcome back".to_string())
        }
    }

    fn context(dir: &Path) -> ExecutorContext {
        ExecutorContext {
            base_url: "http://localhost:3000".to_string(),
            browser: BrowserConfig {
                headless: true,
                args: vec![],
                viewport: Viewport::default(),
                timeout_ms: 1000,
                settle_delay_ms: 0,
            },
            validation: ScreenshotAnalysisConfig::default(),
            screenshots: ArtifactSpec {
                path: dir.join("shots").to_string_lossy().to_string(),
                format: "{route}-{timestamp}.png".to_string(),
            },
            logs: ArtifactSpec {
                path: dir.join("logs").to_string_lossy().to_string(),
                format: "{route}-{timestamp}.log".to_string(),
            },
        }
    }

    fn suite(routes: &[&str]) -> TestSuiteConfig {
        TestSuiteConfig {
            name: "core".to_string(),
            description: "Core routes".to_string(),
            routes: routes.iter().map(|r| r.to_string()).collect(),
            enabled: true,
            timeout_ms: None,
            screenshot_options: Some(ScreenshotOptions { full_page: true }),
        }
    }

    #[tokio::test]
    async fn test_all_routes_pass_with_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let console = ConsoleBuffer::new();
        let mut driver = MockDriver::new(console.clone());
        let executor = RouteExecutor::new(context(tmp.path()));

        let result = executor.run_suite(&mut driver, &console, &suite(&["/", "/dashboard"])).await;

        assert_eq!(result.summary.passed, 2);
        assert_eq!(result.summary.failed, 0);
        for route_result in result.routes.values() {
            assert_eq!(route_result.status, RouteStatus::Passed);
            assert!(route_result.validation.is_some());
            assert!(route_result.error.is_none());
            let shot = route_result.screenshot_path.as_ref().unwrap();
            assert!(Path::new(shot).exists());
            let log = route_result.log_path.as_ref().unwrap();
            assert!(Path::new(log).exists());
        }
    }

    #[tokio::test]
    async fn test_scenario_e_failed_route_does_not_stop_siblings() {
        let tmp = tempfile::tempdir().unwrap();
        let console = ConsoleBuffer::new();
        let mut driver = MockDriver::new(console.clone());
        driver.failing_routes.insert("/broken".to_string());
        let executor = RouteExecutor::new(context(tmp.path()));

        let result = executor
            .run_suite(&mut driver, &console, &suite(&["/ok", "/broken", "/also-ok"]))
            .await;

        assert_eq!(result.summary.total, 3);
        assert_eq!(result.summary.passed, 2);
        assert_eq!(result.summary.failed, 1);

        let broken = &result.routes["/broken"];
        assert_eq!(broken.status, RouteStatus::Failed);
        assert!(broken.error.as_ref().unwrap().contains("timed out"));
        assert!(broken.validation.is_none());

        // All three navigations happened, in order
        assert_eq!(driver.navigations.len(), 3);
        assert!(driver.navigations[2].ends_with("/also-ok"));
    }

    #[tokio::test]
    async fn test_route_log_contains_only_own_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let console = ConsoleBuffer::new();
        let mut driver = MockDriver::new(console.clone());
        let executor = RouteExecutor::new(context(tmp.path()));

        let result = executor.run_suite(&mut driver, &console, &suite(&["/a", "/b"])).await;

        let log_a = std::fs::read_to_string(result.routes["/a"].log_path.as_ref().unwrap()).unwrap();
        assert!(log_a.contains("loaded http://localhost:3000/a"));
        assert!(!log_a.contains("/b"));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://x:3000/", "/admin"), "http://x:3000/admin");
        assert_eq!(join_url("http://x:3000", "admin"), "http://x:3000/admin");
        assert_eq!(join_url("http://x:3000", "/"), "http://x:3000/");
    }
}
