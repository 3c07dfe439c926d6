//! MCP transports
//!
//! [`StdioTransport`] runs the server as a child process and exchanges
//! newline-delimited JSON-RPC messages over its stdin/stdout. A background
//! task reads stdout and hands each response to the request waiting for its
//! id; everything else is logged and dropped.

use crate::error::{McpError, Result};
use crate::protocol::{IncomingMessage, JsonRpcRequest, JsonRpcResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Channel between an MCP client and a server
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Connect to the server
    async fn start(&self) -> Result<()>;

    /// Send a request and wait for the response with the same id
    async fn request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse>;

    /// Send a notification; nothing comes back
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()>;

    /// Disconnect, failing any request still waiting
    async fn close(&self) -> Result<()>;
}

type Pending = Arc<std::sync::Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// Removes a pending entry when the waiting request goes away, e.g. on timeout
struct PendingGuard {
    pending: Pending,
    id: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.id);
        }
    }
}

struct Writer {
    stdin: Mutex<Option<ChildStdin>>,
    log_events: bool,
}

impl Writer {
    async fn send(&self, message: &impl serde::Serialize) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        if self.log_events {
            info!("> {}", line);
        }
        line.push('\n');

        let mut stdin = self.stdin.lock().await;
        let stdin = stdin.as_mut().ok_or(McpError::Closed)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }
}

/// Transport over a child process's stdio
pub struct StdioTransport {
    command: Vec<String>,
    environment: HashMap<String, String>,
    log_events: bool,
    writer: Arc<Writer>,
    pending: Pending,
    child: Mutex<Option<Child>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

/// Builder for [`StdioTransport`]
#[derive(Debug, Default)]
pub struct StdioTransportBuilder {
    command: Vec<String>,
    environment: HashMap<String, String>,
    log_events: bool,
}

impl StdioTransportBuilder {
    /// Program followed by its arguments
    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Variables added to the inherited environment of the server
    pub fn environment<I, K, V>(mut self, environment: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment = environment
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Log every message and the server's stderr at `info`
    pub fn log_events(mut self, log_events: bool) -> Self {
        self.log_events = log_events;
        self
    }

    pub fn build(self) -> Result<StdioTransport> {
        if self.command.is_empty() {
            return Err(McpError::SpawnFailed("empty command".to_string()));
        }

        Ok(StdioTransport {
            command: self.command,
            environment: self.environment,
            log_events: self.log_events,
            writer: Arc::new(Writer {
                stdin: Mutex::new(None),
                log_events: self.log_events,
            }),
            pending: Arc::new(std::sync::Mutex::new(HashMap::new())),
            child: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }
}

impl StdioTransport {
    pub fn builder() -> StdioTransportBuilder {
        StdioTransportBuilder::default()
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    fn register(&self, id: u64) -> Result<(oneshot::Receiver<JsonRpcResponse>, PendingGuard)> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| McpError::Transport("pending request table poisoned".to_string()))?
            .insert(id, tx);
        Ok((
            rx,
            PendingGuard {
                pending: self.pending.clone(),
                id,
            },
        ))
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| McpError::SpawnFailed("empty command".to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(&self.environment)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            self.started.store(false, Ordering::SeqCst);
            McpError::SpawnFailed(format!("failed to spawn '{}': {}", program, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::SpawnFailed("failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::SpawnFailed("failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| McpError::SpawnFailed("failed to capture stderr".to_string()))?;

        info!("Started MCP server: {}", self.command.join(" "));

        *self.writer.stdin.lock().await = Some(stdin);
        *self.child.lock().await = Some(child);

        let reader = tokio::spawn(read_stdout(
            BufReader::new(stdout),
            self.pending.clone(),
            self.writer.clone(),
            self.log_events,
        ));
        let log_events = self.log_events;
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if log_events {
                    info!("[server stderr] {}", line);
                } else {
                    debug!("[server stderr] {}", line);
                }
            }
        });

        self.tasks.lock().await.extend([reader, stderr_task]);
        Ok(())
    }

    async fn request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(McpError::NotStarted);
        }

        let id = request
            .id
            .as_ref()
            .and_then(Value::as_u64)
            .ok_or_else(|| McpError::Protocol("request needs a numeric id".to_string()))?;

        let (rx, _guard) = self.register(id)?;
        self.writer.send(&request).await?;

        rx.await.map_err(|_| McpError::Closed)
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(McpError::NotStarted);
        }
        self.writer
            .send(&JsonRpcRequest::notification(method, params))
            .await
    }

    async fn close(&self) -> Result<()> {
        self.writer.stdin.lock().await.take();

        if let Some(mut child) = self.child.lock().await.take() {
            let _ = child.kill().await;
            let _ = child.wait().await;
            info!("Stopped MCP server: {}", self.command.join(" "));
        }

        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }

        if let Ok(mut pending) = self.pending.lock() {
            pending.clear();
        }
        Ok(())
    }
}

async fn read_stdout<R>(mut reader: R, pending: Pending, writer: Arc<Writer>, log_events: bool)
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to read from MCP server: {}", e);
                break;
            }
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if log_events {
            info!("< {}", trimmed);
        }

        match IncomingMessage::parse(trimmed) {
            Ok(IncomingMessage::Response(response)) => {
                let waiter = response
                    .numeric_id()
                    .and_then(|id| pending.lock().ok()?.remove(&id));
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => debug!("Dropping response nobody waits for: id={:?}", response.id),
                }
            }
            Ok(IncomingMessage::Request(request)) => {
                if request.method == "ping" && !request.is_notification() {
                    let pong = JsonRpcResponse::success(request.id, serde_json::json!({}));
                    if let Err(e) = writer.send(&pong).await {
                        warn!("Failed to answer server ping: {}", e);
                    }
                } else {
                    debug!("Ignoring server message: {}", request.method);
                }
            }
            Err(_) => debug!("Ignoring non-JSON-RPC line from server: {}", trimmed),
        }
    }

    debug!("MCP server closed stdout");
    if let Ok(mut pending) = pending.lock() {
        // Dropping the senders wakes every waiter with `Closed`
        pending.clear();
    }
}
