//! Playwright agent process protocol
//!
//! The browser is driven through a long-lived `node` child process running
//! an embedded Playwright script. Commands go to its stdin as JSON lines;
//! results and console events come back on stdout as JSON lines.

use routeqa_common::config::BrowserConfig;
use routeqa_common::types::ConsoleLevel;
use serde::{Deserialize, Serialize};

/// A command sent to the agent
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AgentCommand {
    Navigate { url: String, timeout_ms: u64 },
    Screenshot { path: String, full_page: bool },
    QueryBox { selector: String },
    Count { selector: String },
    Title,
    BodyText,
    Shutdown,
}

/// Command with its correlation id
#[derive(Debug, Clone, Serialize)]
pub struct CommandEnvelope {
    pub id: u64,
    #[serde(flatten)]
    pub command: AgentCommand,
}

/// Bounding box of a DOM element in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ElementBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// An event read from the agent's stdout
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Browser and page are up; sent once after launch
    Ready,
    /// A console message or uncaught page error
    Console {
        level: ConsoleLevel,
        text: String,
        url: String,
        timestamp_ms: i64,
    },
    /// Reply to a command
    Result {
        id: u64,
        ok: bool,
        #[serde(default)]
        data: Option<serde_json::Value>,
        #[serde(default)]
        error: Option<String>,
    },
    /// Unrecoverable agent failure
    Fatal { error: String },
}

/// Render the agent script for a browser configuration.
///
/// The script registers console and pageerror listeners once, page-scoped
/// for the whole run, then serves commands from stdin until `shutdown`.
pub fn render_agent_script(config: &BrowserConfig) -> String {
    let args_json = serde_json::to_string(&config.args).unwrap_or_else(|_| "[]".to_string());
    AGENT_TEMPLATE
        .replace("__HEADLESS__", if config.headless { "true" } else { "false" })
        .replace("__ARGS__", &args_json)
        .replace("__WIDTH__", &config.viewport.width.to_string())
        .replace("__HEIGHT__", &config.viewport.height.to_string())
}

const AGENT_TEMPLATE: &str = r#"
const readline = require('readline');
const { chromium } = require('playwright');

(async () => {
  const browser = await chromium.launch({ headless: __HEADLESS__, args: __ARGS__ });
  const context = await browser.newContext({
    viewport: { width: __WIDTH__, height: __HEIGHT__ }
  });
  const page = await context.newPage();

  const emit = (obj) => process.stdout.write(JSON.stringify(obj) + '\n');

  page.on('console', (msg) => {
    const t = msg.type();
    const level = t === 'warning' ? 'warn' : (t === 'error' ? 'error' : 'log');
    emit({ event: 'console', level, text: msg.text(), url: page.url(), timestamp_ms: Date.now() });
  });
  page.on('pageerror', (err) => {
    emit({ event: 'console', level: 'pageerror', text: String(err), url: page.url(), timestamp_ms: Date.now() });
  });

  emit({ event: 'ready' });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    let cmd;
    try { cmd = JSON.parse(line); } catch { continue; }
    const reply = (ok, data, error) => emit({ event: 'result', id: cmd.id, ok, data, error });
    try {
      switch (cmd.cmd) {
        case 'navigate':
          await page.goto(cmd.url, { timeout: cmd.timeout_ms, waitUntil: 'networkidle' });
          reply(true, null, null);
          break;
        case 'screenshot':
          await page.screenshot({ path: cmd.path, fullPage: !!cmd.full_page });
          reply(true, null, null);
          break;
        case 'query_box': {
          const el = await page.$(cmd.selector);
          const box = el ? await el.boundingBox() : null;
          reply(true, box, null);
          break;
        }
        case 'count': {
          const n = await page.$$eval(cmd.selector, (els) => els.length);
          reply(true, { count: n }, null);
          break;
        }
        case 'title':
          reply(true, { title: await page.title() }, null);
          break;
        case 'body_text': {
          const text = await page.evaluate(() => document.body ? document.body.innerText : '');
          reply(true, { text }, null);
          break;
        }
        case 'shutdown':
          reply(true, null, null);
          await browser.close();
          process.exit(0);
        default:
          reply(false, null, 'unknown command: ' + cmd.cmd);
      }
    } catch (err) {
      reply(false, null, err && err.message ? err.message : String(err));
    }
  }
  await browser.close();
})().catch((err) => {
  process.stdout.write(JSON.stringify({ event: 'fatal', error: String(err) }) + '\n');
  process.exit(1);
});
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use routeqa_common::config::Viewport;

    #[test]
    fn test_command_envelope_wire_format() {
        let envelope = CommandEnvelope {
            id: 7,
            command: AgentCommand::Navigate {
                url: "http://localhost:3000/admin".to_string(),
                timeout_ms: 30000,
            },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["cmd"], "navigate");
        assert_eq!(json["timeout_ms"], 30000);
    }

    #[test]
    fn test_event_parsing() {
        let line = r#"{"event":"console","level":"pageerror","text":"TypeError: x","url":"http://localhost:3000/","timestamp_ms":1700000000000}"#;
        match serde_json::from_str::<AgentEvent>(line).unwrap() {
            AgentEvent::Console { level, text, .. } => {
                assert_eq!(level, ConsoleLevel::PageError);
                assert!(text.starts_with("TypeError"));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let line = r#"{"event":"result","id":3,"ok":false,"error":"timeout"}"#;
        match serde_json::from_str::<AgentEvent>(line).unwrap() {
            AgentEvent::Result { id, ok, error, data } => {
                assert_eq!(id, 3);
                assert!(!ok);
                assert_eq!(error.as_deref(), Some("timeout"));
                assert!(data.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_render_agent_script_substitutes_config() {
        let config = BrowserConfig {
            headless: false,
            args: vec!["--no-sandbox".to_string()],
            viewport: Viewport { width: 1920, height: 1080 },
            timeout_ms: 30000,
            settle_delay_ms: 2000,
        };
        let script = render_agent_script(&config);
        assert!(script.contains("headless: false"));
        assert!(script.contains(r#"["--no-sandbox"]"#));
        assert!(script.contains("width: 1920"));
        assert!(!script.contains("__HEADLESS__"));
    }
}
