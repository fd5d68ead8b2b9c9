//! Post-load validation probes
//!
//! Each probe is independent and degrades on its own: a throwing probe
//! yields that field's conservative default instead of failing the route.

use routeqa_common::config::ScreenshotAnalysisConfig;
use routeqa_common::types::RouteValidationResult;
use routeqa_driver::session::PageDriver;
use tracing::warn;

/// Run the UI probes against the currently loaded page
pub async fn run_validation<D: PageDriver>(
    driver: &mut D,
    config: &ScreenshotAnalysisConfig,
    load_time_ms: u64,
) -> RouteValidationResult {
    let mut result = RouteValidationResult { load_time_ms, ..Default::default() };

    match driver.page_title().await {
        Ok(title) => result.has_title = !title.trim().is_empty(),
        Err(e) => warn!("Title probe failed: {}", e),
    }

    match driver.query_box(&config.sidebar_selector).await {
        Ok(Some(bounds)) => {
            result.sidebar_visible = true;
            result.sidebar_width_px = bounds.width;
        }
        Ok(None) => {}
        Err(e) => warn!("Sidebar probe failed: {}", e),
    }

    match driver.body_text().await {
        Ok(text) => {
            result.has_error_banner =
                config.error_indicators.iter().any(|indicator| text.contains(indicator.as_str()));
        }
        Err(e) => warn!("Body text probe failed: {}", e),
    }

    match driver.count_elements(&config.content_selector).await {
        Ok(count) => {
            result.content_element_count = count.min(u32::MAX as u64) as u32;
            // A blank verdict requires positive evidence of emptiness
            result.is_blank_dashboard = count == 0;
        }
        Err(e) => warn!("Content count probe failed: {}", e),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use routeqa_common::{Error, Result};
    use routeqa_driver::agent::ElementBox;
    use std::path::Path;

    struct ProbeDriver {
        title: Result<String>,
        sidebar: Result<Option<ElementBox>>,
        body: Result<String>,
        count: Result<u64>,
    }

    impl ProbeDriver {
        fn healthy() -> Self {
            Self {
                title: Ok("Orbis Dashboard".to_string()),
                sidebar: Ok(Some(ElementBox { x: 0.0, y: 0.0, width: 240.0, height: 900.0 })),
                body: Ok("Welcome back, operator".to_string()),
                count: Ok(34),
            }
        }
    }

    fn take<T: Clone>(slot: &Result<T>) -> Result<T> {
        match slot {
            Ok(v) => Ok(v.clone()),
            Err(e) => Err(Error::Analysis(e.to_string())),
        }
    }

    #[async_trait]
    impl PageDriver for ProbeDriver {
        async fn navigate(&mut self, _url: &str, _timeout_ms: u64) -> Result<()> {
            Ok(())
        }
        async fn screenshot(&mut self, _path: &Path, _full_page: bool) -> Result<()> {
            Ok(())
        }
        async fn query_box(&mut self, _selector: &str) -> Result<Option<ElementBox>> {
            take(&self.sidebar)
        }
        async fn count_elements(&mut self, _selector: &str) -> Result<u64> {
            take(&self.count)
        }
        async fn page_title(&mut self) -> Result<String> {
            take(&self.title)
        }
        async fn body_text(&mut self) -> Result<String> {
            take(&self.body)
        }
    }

    fn config() -> ScreenshotAnalysisConfig {
        ScreenshotAnalysisConfig {
            error_indicators: vec!["Something went wrong".to_string(), "404".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_healthy_page() {
        let mut driver = ProbeDriver::healthy();
        let result = run_validation(&mut driver, &config(), 1200).await;

        assert!(result.has_title);
        assert!(result.sidebar_visible);
        assert_eq!(result.sidebar_width_px, 240.0);
        assert!(!result.has_error_banner);
        assert!(!result.is_blank_dashboard);
        assert_eq!(result.content_element_count, 34);
        assert_eq!(result.load_time_ms, 1200);
    }

    #[tokio::test]
    async fn test_error_banner_detected_by_indicator_substring() {
        let mut driver = ProbeDriver::healthy();
        driver.body = Ok("Oops. Something went wrong while loading widgets".to_string());
        let result = run_validation(&mut driver, &config(), 0).await;
        assert!(result.has_error_banner);
    }

    #[tokio::test]
    async fn test_zero_content_elements_means_blank() {
        let mut driver = ProbeDriver::healthy();
        driver.count = Ok(0);
        let result = run_validation(&mut driver, &config(), 0).await;
        assert!(result.is_blank_dashboard);
        assert_eq!(result.content_element_count, 0);
    }

    #[tokio::test]
    async fn test_failing_probes_degrade_independently() {
        let mut driver = ProbeDriver::healthy();
        driver.title = Err(Error::Analysis("detached frame".into()));
        driver.count = Err(Error::Analysis("evaluation failed".into()));
        let result = run_validation(&mut driver, &config(), 300).await;

        // Failed probes fall back conservatively; a failed count probe is
        // not evidence of a blank page
        assert!(!result.has_title);
        assert!(!result.is_blank_dashboard);
        assert_eq!(result.content_element_count, 0);
        // Healthy probes still report
        assert!(result.sidebar_visible);
        assert!(!result.has_error_banner);
        assert_eq!(result.load_time_ms, 300);
    }

    #[tokio::test]
    async fn test_missing_sidebar_reports_invisible() {
        let mut driver = ProbeDriver::healthy();
        driver.sidebar = Ok(None);
        let result = run_validation(&mut driver, &config(), 0).await;
        assert!(!result.sidebar_visible);
        assert_eq!(result.sidebar_width_px, 0.0);
    }

    #[tokio::test]
    async fn test_whitespace_title_is_no_title() {
        let mut driver = ProbeDriver::healthy();
        driver.title = Ok("   ".to_string());
        let result = run_validation(&mut driver, &config(), 0).await;
        assert!(!result.has_title);
    }
}
