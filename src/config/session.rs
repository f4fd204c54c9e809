//! The node process that holds an evaluated config module.
//!
//! The config is evaluated once and stays loaded so that JavaScript values
//! it exports (hook functions, plugins, `write: false` results) remain
//! usable after loading. Requests are written to the process' stdin and
//! replies are read from its stdout, one JSON object per line. Reply lines
//! begin with [`RECORD_SEPARATOR`]; anything else on stdout is the config's
//! own output and is passed through.

use super::resolver::ModuleKind;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, mpsc};

const HARNESS: &str = include_str!("harness.js");

/// Prefix of every reply line.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// A request to the config process.
#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "kebab-case")]
pub enum Request<'a> {
    /// Evaluate the module; CJS payloads travel inline
    Load { payload: Option<&'a str> },

    /// One build of `configs[index]` through the esbuild API
    Build { index: usize },

    /// Watch `configs[index]`; every build produces a `Built` reply
    Watch { index: usize },

    /// Call a hook function of `configs[index]`
    Hook {
        index: usize,
        field: &'a str,
        outcome: Value,
    },
}

/// A reply from the config process.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Reply {
    Loaded {
        #[serde(default)]
        value: Value,
        /// Whether the esbuild JavaScript API could be loaded
        #[serde(default)]
        api: bool,
    },
    LoadFailed {
        message: String,
    },
    Built {
        report: BuildReport,
    },
    WatchStopped,
    HookDone,
}

/// Outcome of one build run by the esbuild API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildReport {
    pub ok: bool,
    #[serde(default)]
    pub outputs: Vec<ReportedOutput>,
    #[serde(default)]
    pub warnings: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: String,
    #[serde(default, rename = "durationMs")]
    pub duration_ms: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportedOutput {
    pub path: String,
    pub bytes: u64,
}

type Routes = Arc<StdMutex<HashMap<u64, mpsc::UnboundedSender<Reply>>>>;

/// Handle to a running config process. Clones share the process, which is
/// killed once the last handle is dropped.
#[derive(Clone)]
pub struct ConfigSession {
    inner: Arc<Inner>,
}

struct Inner {
    config_path: PathBuf,
    api: AtomicBool,
    next_id: AtomicU64,
    stdin: Mutex<ChildStdin>,
    routes: Routes,
    _child: StdMutex<Child>,
}

impl fmt::Debug for ConfigSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSession")
            .field("config_path", &self.inner.config_path)
            .field("api", &self.api_available())
            .finish()
    }
}

impl ConfigSession {
    /// Starts `node` with the harness. Nothing is evaluated until
    /// [`load`](Self::load).
    ///
    /// # Arguments
    /// * `entry` - module node imports: the config itself for CJS, the
    ///   temporary `.mjs` copy for ESM
    /// * `esbuild_package` - esbuild package to fall back to when the
    ///   project has none
    pub fn spawn(
        node: &Path,
        config_path: &Path,
        entry: &Path,
        module_kind: ModuleKind,
        esbuild_package: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut cmd = Command::new(node);
        cmd.arg("-e")
            .arg(HARNESS)
            .env("ESBUILD_CLI_EVAL_MODE", module_kind.format())
            .env("ESBUILD_CLI_EVAL_ENTRY", entry)
            .env("ESBUILD_CLI_CONFIG_FILE", config_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(package) = esbuild_package {
            cmd.env("ESBUILD_CLI_ESBUILD_PACKAGE", package);
        }

        let mut child = cmd.spawn().map_err(|e| ConfigError::Evaluation {
            path: config_path.to_path_buf(),
            reason: format!("failed to start {}: {}", node.display(), e),
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(ConfigError::Evaluation {
                path: config_path.to_path_buf(),
                reason: "node was started without pipes".to_string(),
            });
        };

        let routes = Routes::default();
        tokio::spawn(read_replies(stdout, Arc::clone(&routes)));

        Ok(Self {
            inner: Arc::new(Inner {
                config_path: config_path.to_path_buf(),
                api: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
                stdin: Mutex::new(stdin),
                routes,
                _child: StdMutex::new(child),
            }),
        })
    }

    /// Whether builds can go through the esbuild JavaScript API.
    pub fn api_available(&self) -> bool {
        self.inner.api.load(Ordering::Acquire)
    }

    /// Evaluates the module and returns its export as JSON.
    pub async fn load(&self, payload: Option<&str>) -> Result<Value, ConfigError> {
        let evaluation_error = |reason: String| ConfigError::Evaluation {
            path: self.inner.config_path.clone(),
            reason,
        };

        let mut replies = self
            .request(Request::Load { payload })
            .await
            .map_err(|e| evaluation_error(format!("failed to send config to node: {}", e)))?;

        match replies.recv().await {
            Some(Reply::Loaded { value, api }) => {
                self.inner.api.store(api, Ordering::Release);
                Ok(value)
            }
            Some(Reply::LoadFailed { message }) => Err(evaluation_error(message)),
            Some(other) => Err(evaluation_error(format!("unexpected reply {:?}", other))),
            None => Err(evaluation_error(
                "node exited before the config finished loading".to_string(),
            )),
        }
    }

    /// Sends a request and returns the channel its replies arrive on.
    ///
    /// The channel closes when the process exits.
    pub async fn request(&self, request: Request<'_>) -> io::Result<mpsc::UnboundedReceiver<Reply>> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let line = encode_request(id, &request)?;

        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut routes) = self.inner.routes.lock() {
            routes.insert(id, tx);
        }

        let mut stdin = self.inner.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(rx)
    }

    /// Calls a hook function exported by the config and waits for it.
    ///
    /// Failures are logged; hooks never change a build outcome.
    pub async fn run_hook(&self, index: usize, field: &str, outcome: Value) {
        let mut replies = match self.request(Request::Hook { index, field, outcome }).await {
            Ok(replies) => replies,
            Err(e) => {
                log::warn!("failed to call `{}` in the config: {}", field, e);
                return;
            }
        };

        loop {
            match replies.recv().await {
                Some(Reply::HookDone) => return,
                Some(other) => log::debug!("ignoring reply while `{}` runs: {:?}", field, other),
                None => {
                    log::warn!("config process exited while `{}` was running", field);
                    return;
                }
            }
        }
    }
}

fn encode_request(id: u64, request: &Request<'_>) -> io::Result<String> {
    let mut message = serde_json::to_value(request).map_err(io::Error::other)?;
    if let Value::Object(fields) = &mut message {
        fields.insert("id".to_string(), Value::from(id));
    }
    let mut line = message.to_string();
    line.push('\n');
    Ok(line)
}

/// Splits one stdout line into passthrough text and a reply.
fn split_line(line: &str) -> (&str, Option<&str>) {
    match line.find(RECORD_SEPARATOR) {
        Some(at) => (&line[..at], Some(&line[at + RECORD_SEPARATOR.len_utf8()..])),
        None => (line, None),
    }
}

fn parse_reply(message: &str) -> Result<(u64, Reply), serde_json::Error> {
    let value: Value = serde_json::from_str(message)?;
    let id = value.get("id").and_then(Value::as_u64).unwrap_or_default();
    Ok((id, serde_json::from_value(value)?))
}

async fn read_replies(stdout: ChildStdout, routes: Routes) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                log::debug!("config process stdout closed: {}", e);
                break;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        let (printed, message) = split_line(line);
        if message.is_none() || !printed.is_empty() {
            println!("{}", printed);
        }
        let Some(message) = message else {
            continue;
        };

        match parse_reply(message) {
            Ok((id, reply)) => deliver(&routes, id, reply),
            Err(e) => log::warn!("unreadable reply from config process: {}", e),
        }
    }

    if let Ok(mut routes) = routes.lock() {
        routes.clear();
    }
}

fn deliver(routes: &Routes, id: u64, reply: Reply) {
    let Ok(mut routes) = routes.lock() else {
        return;
    };
    match routes.get(&id) {
        Some(tx) => {
            if tx.send(reply).is_err() {
                routes.remove(&id);
            }
        }
        None => log::debug!("no listener for reply to request {}", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_carry_command_and_id() {
        let line = encode_request(7, &Request::Build { index: 2 }).unwrap();
        assert!(line.ends_with('\n'));
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value, json!({ "cmd": "build", "index": 2, "id": 7 }));

        let line = encode_request(
            8,
            &Request::Hook {
                index: 0,
                field: "watch.onRebuild",
                outcome: json!({ "ok": true }),
            },
        )
        .unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["cmd"], "hook");
        assert_eq!(value["field"], "watch.onRebuild");
    }

    #[test]
    fn replies_are_separated_from_config_output() {
        assert_eq!(split_line("hello from config"), ("hello from config", None));
        assert_eq!(
            split_line("\u{1e}{\"id\":1,\"event\":\"hook-done\"}"),
            ("", Some("{\"id\":1,\"event\":\"hook-done\"}"))
        );
        assert_eq!(
            split_line("partial\u{1e}{\"id\":2}"),
            ("partial", Some("{\"id\":2}"))
        );
    }

    #[test]
    fn replies_parse_with_their_id() {
        let (id, reply) = parse_reply(
            r#"{"id":3,"event":"loaded","value":{"outfile":"a.js"},"api":true}"#,
        )
        .unwrap();
        assert_eq!(id, 3);
        assert!(matches!(reply, Reply::Loaded { api: true, .. }));

        let (_, reply) = parse_reply(
            r#"{"id":4,"event":"built","report":{"ok":false,"message":"boom","details":"a.js:1:0"}}"#,
        )
        .unwrap();
        let Reply::Built { report } = reply else {
            panic!("expected a build report");
        };
        assert!(!report.ok);
        assert_eq!(report.message, "boom");

        let (id, reply) = parse_reply(r#"{"id":5,"event":"hook-done"}"#).unwrap();
        assert_eq!(id, 5);
        assert!(matches!(reply, Reply::HookDone));
    }

    #[tokio::test]
    async fn dropped_listener_is_forgotten() {
        let routes = Routes::default();
        let (tx, rx) = mpsc::unbounded_channel();
        routes.lock().unwrap().insert(1, tx);
        drop(rx);

        deliver(&routes, 1, Reply::HookDone);
        assert!(routes.lock().unwrap().is_empty());
    }
}
