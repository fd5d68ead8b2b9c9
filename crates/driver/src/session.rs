//! Browser session management
//!
//! One browser instance and one page exist for the whole run. The session
//! owns the agent child process, the console buffer, and the command
//! channel; all command traffic is strictly sequential.

use crate::agent::{
    render_agent_script, AgentCommand, AgentEvent, CommandEnvelope, ElementBox,
};
use crate::console::ConsoleBuffer;
use async_trait::async_trait;
use routeqa_common::config::BrowserConfig;
use routeqa_common::types::ConsoleLogEntry;
use routeqa_common::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Capability interface the executor drives routes through.
///
/// The production implementation is [`BrowserSession`]; tests substitute
/// a mock. Geometry and content probes are best-effort and surface
/// failures as `Error::Analysis` so the executor can degrade validation
/// fields instead of failing the route.
#[async_trait]
pub trait PageDriver: Send {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<()>;
    async fn screenshot(&mut self, path: &Path, full_page: bool) -> Result<()>;
    async fn query_box(&mut self, selector: &str) -> Result<Option<ElementBox>>;
    async fn count_elements(&mut self, selector: &str) -> Result<u64>;
    async fn page_title(&mut self) -> Result<String>;
    async fn body_text(&mut self) -> Result<String>;
}

/// Reply to one command, routed back from the reader task
#[derive(Debug)]
struct CommandResult {
    id: u64,
    ok: bool,
    data: Option<serde_json::Value>,
    error: Option<String>,
}

/// Handle to the run-scoped browser and its agent process
pub struct BrowserSession {
    child: Child,
    stdin: ChildStdin,
    results: mpsc::Receiver<CommandResult>,
    console: ConsoleBuffer,
    next_id: u64,
    // Keeps the agent script on disk for the lifetime of the session
    _workdir: tempfile::TempDir,
}

const READY_TIMEOUT: Duration = Duration::from_secs(30);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const NAV_TIMEOUT_GRACE_MS: u64 = 5_000;

impl BrowserSession {
    /// Launch the browser agent and wait for it to become ready.
    ///
    /// Failure here (node missing, Playwright missing, handshake timeout)
    /// is fatal to the run.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        Self::check_node_installed()?;

        let workdir = tempfile::tempdir()
            .map_err(|e| Error::BrowserLaunch(format!("cannot create agent dir: {}", e)))?;
        let script_path = workdir.path().join("agent.js");
        std::fs::write(&script_path, render_agent_script(config))
            .map_err(|e| Error::BrowserLaunch(format!("cannot write agent script: {}", e)))?;

        debug!("Spawning browser agent: node {}", script_path.display());

        let mut child = Command::new("node")
            .arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::BrowserLaunch(format!("failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::BrowserLaunch("agent stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::BrowserLaunch("agent stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::BrowserLaunch("agent stderr unavailable".to_string()))?;

        let console = ConsoleBuffer::new();
        let (results_tx, results_rx) = mpsc::channel(64);
        let (ready_tx, ready_rx) = oneshot::channel();

        tokio::spawn(read_agent_events(stdout, console.clone(), results_tx, ready_tx));
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("agent stderr: {}", line);
            }
        });

        match timeout(READY_TIMEOUT, ready_rx).await {
            Ok(Ok(())) => {}
            _ => {
                let _ = child.kill().await;
                return Err(Error::BrowserLaunch(
                    "agent did not become ready; is Playwright installed? (npx playwright install chromium)"
                        .to_string(),
                ));
            }
        }

        info!("Browser session ready ({}x{}, headless={})",
            config.viewport.width, config.viewport.height, config.headless);

        Ok(Self {
            child,
            stdin,
            results: results_rx,
            console,
            next_id: 0,
            _workdir: workdir,
        })
    }

    /// Verify node is on PATH
    fn check_node_installed() -> Result<()> {
        let status = std::process::Command::new("node")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(s) if s.success() => Ok(()),
            _ => Err(Error::BrowserLaunch("node not found on PATH".to_string())),
        }
    }

    /// Shared handle to the run-scoped console stream
    pub fn console(&self) -> ConsoleBuffer {
        self.console.clone()
    }

    /// Send one command and wait for its reply
    async fn send(&mut self, command: AgentCommand, wait: Duration) -> Result<CommandResult> {
        self.next_id += 1;
        let id = self.next_id;
        let envelope = CommandEnvelope { id, command };
        let mut line = serde_json::to_string(&envelope)
            .map_err(|e| Error::Analysis(format!("cannot encode command: {}", e)))?;
        line.push('\n');

        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::Analysis(format!("agent write failed: {}", e)))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| Error::Analysis(format!("agent flush failed: {}", e)))?;

        loop {
            match timeout(wait, self.results.recv()).await {
                Ok(Some(result)) if result.id == id => return Ok(result),
                Ok(Some(stale)) => {
                    // Reply to a command we already gave up on
                    warn!("Discarding stale agent reply (id {})", stale.id);
                }
                Ok(None) => {
                    return Err(Error::Analysis("agent exited unexpectedly".to_string()));
                }
                Err(_) => {
                    return Err(Error::Analysis(format!(
                        "agent command timed out after {:?}",
                        wait
                    )));
                }
            }
        }
    }

    /// Shut the agent down, killing it if it does not exit promptly
    pub async fn close(&mut self) {
        let _ = self.send(AgentCommand::Shutdown, Duration::from_secs(5)).await;
        match timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(Ok(status)) => debug!("Agent exited: {}", status),
            _ => {
                warn!("Agent did not exit cleanly; killing");
                let _ = self.child.kill().await;
            }
        }
    }
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<()> {
        let wait = Duration::from_millis(timeout_ms + NAV_TIMEOUT_GRACE_MS);
        let result = self
            .send(AgentCommand::Navigate { url: url.to_string(), timeout_ms }, wait)
            .await;

        match result {
            Ok(r) if r.ok => Ok(()),
            Ok(r) => {
                let reason = r.error.unwrap_or_else(|| "unknown navigation error".to_string());
                if reason.to_lowercase().contains("timeout") {
                    Err(Error::RouteTimeout { route: url.to_string(), ms: timeout_ms })
                } else {
                    Err(Error::Navigation { route: url.to_string(), reason })
                }
            }
            Err(Error::Analysis(msg)) if msg.contains("timed out") => {
                Err(Error::RouteTimeout { route: url.to_string(), ms: timeout_ms })
            }
            Err(e) => Err(Error::Navigation { route: url.to_string(), reason: e.to_string() }),
        }
    }

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> Result<()> {
        let result = self
            .send(
                AgentCommand::Screenshot {
                    path: path.to_string_lossy().to_string(),
                    full_page,
                },
                COMMAND_TIMEOUT,
            )
            .await?;
        if result.ok {
            Ok(())
        } else {
            Err(Error::ArtifactWrite(
                result.error.unwrap_or_else(|| "screenshot failed".to_string()),
            ))
        }
    }

    async fn query_box(&mut self, selector: &str) -> Result<Option<ElementBox>> {
        let result = self
            .send(AgentCommand::QueryBox { selector: selector.to_string() }, COMMAND_TIMEOUT)
            .await?;
        if !result.ok {
            return Err(Error::Analysis(
                result.error.unwrap_or_else(|| "query_box failed".to_string()),
            ));
        }
        match result.data {
            Some(value) if !value.is_null() => {
                let boxed: ElementBox = serde_json::from_value(value)
                    .map_err(|e| Error::Analysis(format!("bad bounding box: {}", e)))?;
                Ok(Some(boxed))
            }
            _ => Ok(None),
        }
    }

    async fn count_elements(&mut self, selector: &str) -> Result<u64> {
        let result = self
            .send(AgentCommand::Count { selector: selector.to_string() }, COMMAND_TIMEOUT)
            .await?;
        if !result.ok {
            return Err(Error::Analysis(
                result.error.unwrap_or_else(|| "count failed".to_string()),
            ));
        }
        let count = result
            .data
            .as_ref()
            .and_then(|d| d.get("count"))
            .and_then(|c| c.as_u64())
            .ok_or_else(|| Error::Analysis("count reply missing count".to_string()))?;
        Ok(count)
    }

    async fn page_title(&mut self) -> Result<String> {
        let result = self.send(AgentCommand::Title, COMMAND_TIMEOUT).await?;
        if !result.ok {
            return Err(Error::Analysis(
                result.error.unwrap_or_else(|| "title failed".to_string()),
            ));
        }
        Ok(result
            .data
            .as_ref()
            .and_then(|d| d.get("title"))
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string())
    }

    async fn body_text(&mut self) -> Result<String> {
        let result = self.send(AgentCommand::BodyText, COMMAND_TIMEOUT).await?;
        if !result.ok {
            return Err(Error::Analysis(
                result.error.unwrap_or_else(|| "body_text failed".to_string()),
            ));
        }
        Ok(result
            .data
            .as_ref()
            .and_then(|d| d.get("text"))
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string())
    }
}

/// Read agent stdout, routing console events into the buffer and command
/// replies to the session
async fn read_agent_events(
    stdout: tokio::process::ChildStdout,
    console: ConsoleBuffer,
    results: mpsc::Sender<CommandResult>,
    ready: oneshot::Sender<()>,
) {
    let mut ready = Some(ready);
    let mut lines = BufReader::new(stdout).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let event: AgentEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(_) => {
                // Stray prints from the page or Playwright itself
                debug!("agent noise: {}", line);
                continue;
            }
        };

        match event {
            AgentEvent::Ready => {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(());
                }
            }
            AgentEvent::Console { level, text, url, timestamp_ms } => {
                console.push(ConsoleLogEntry { timestamp_ms, level, text, source_url: url });
            }
            AgentEvent::Result { id, ok, data, error } => {
                if results.send(CommandResult { id, ok, data, error }).await.is_err() {
                    break;
                }
            }
            AgentEvent::Fatal { error } => {
                warn!("Agent fatal error: {}", error);
                break;
            }
        }
    }
    debug!("Agent event reader finished");
}
