//! Environment bootstrap - spawning and health checking the system under test
//!
//! The dev server is a black box: we spawn its startup command, wait the
//! configured settle delay, then poll the base URL until it responds.

use routeqa_common::config::EnvironmentConfig;
use routeqa_common::{Error, Result};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(60);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Handle to the environment under test for the duration of the run
pub struct EnvironmentHandle {
    child: Option<Child>,
    pub base_url: String,
}

impl EnvironmentHandle {
    /// Start (or attach to) the environment and wait until it is reachable.
    ///
    /// When no `startup_command` is configured the environment is assumed
    /// to be already running and only the health check is performed.
    pub async fn start(config: &EnvironmentConfig) -> Result<Self> {
        let child = match &config.startup_command {
            Some(command) if !command.is_empty() => {
                info!("Starting environment: {}", command);
                let child = Command::new("sh")
                    .arg("-c")
                    .arg(command)
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                    .map_err(|e| {
                        Error::EnvironmentStartup(format!("failed to spawn '{}': {}", command, e))
                    })?;
                Some(child)
            }
            _ => {
                debug!("No startup command; attaching to {}", config.base_url);
                None
            }
        };

        if config.start_delay_ms > 0 {
            sleep(Duration::from_millis(config.start_delay_ms)).await;
        }

        let handle = Self { child, base_url: config.base_url.clone() };
        handle.wait_for_healthy().await?;

        info!("Environment is reachable at {}", handle.base_url);
        Ok(handle)
    }

    /// Poll the base URL until any HTTP response arrives
    async fn wait_for_healthy(&self) -> Result<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| Error::EnvironmentStartup(format!("http client: {}", e)))?;

        let start = std::time::Instant::now();
        let mut attempts = 0usize;

        while start.elapsed() < HEALTH_TIMEOUT {
            attempts += 1;
            match client.get(&self.base_url).send().await {
                // Any response means the server is up; status is the
                // application's business, not ours
                Ok(_) => return Ok(()),
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for {} to come up...", self.base_url);
                    }
                    if !e.is_connect() && !e.is_timeout() {
                        warn!("Health check error: {}", e);
                    }
                }
            }
            sleep(HEALTH_POLL_INTERVAL).await;
        }

        Err(Error::EnvironmentStartup(format!(
            "{} not reachable after {} attempts",
            self.base_url, attempts
        )))
    }

    /// Stop the spawned environment, if we own one
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            info!("Stopping environment (pid {})", child.id());

            #[cfg(unix)]
            {
                use nix::sys::signal::{kill, Signal};
                use nix::unistd::Pid;

                let pid = Pid::from_raw(child.id() as i32);
                if kill(pid, Signal::SIGTERM).is_ok() {
                    std::thread::sleep(Duration::from_millis(500));
                }
            }

            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for EnvironmentHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
