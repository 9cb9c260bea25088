//! MCP Transport layer implementations

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

/// Transport trait for MCP communication
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&mut self, message: Value) -> io::Result<()>;
    async fn receive(&mut self) -> io::Result<Option<Value>>;
    /// Close the session side of the channel
    async fn close(&mut self) -> io::Result<()>;

    /// Close the channel and stop whatever serves it.
    ///
    /// Transports without a backing process only need `close`.
    async fn terminate(&mut self, _grace: Duration) -> io::Result<()> {
        self.close().await
    }
}

/// Stdio transport for subprocess communication
pub struct StdioTransport {
    child: Child,
    writer: Option<ChildStdin>,
    reader: Option<BufReader<ChildStdout>>,
}

impl StdioTransport {
    /// Spawn `command` with `args` and extra environment variables layered on
    /// top of the inherited environment.
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> io::Result<Self> {
        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("Failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("Failed to capture stdout"))?;

        debug!(command, pid = ?child.id(), "Spawned MCP server process");

        Ok(Self {
            child,
            writer: Some(stdin),
            reader: Some(BufReader::new(stdout)),
        })
    }

    /// OS process id, if the child is still running
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&mut self, message: Value) -> io::Result<()> {
        let stdin = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "Stdin not available"))?;

        let json = serde_json::to_string(&message)?;
        stdin.write_all(json.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;

        Ok(())
    }

    async fn receive(&mut self) -> io::Result<Option<Value>> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "Reader not available"))?;

        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).await?;

            if n == 0 {
                return Ok(None);
            }
            if line.trim().is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(line.trim_end())?;
            return Ok(Some(value));
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        // Dropping stdin delivers EOF, which is the stdio shutdown signal
        if let Some(mut stdin) = self.writer.take() {
            let _ = stdin.shutdown().await;
        }
        Ok(())
    }

    async fn terminate(&mut self, grace: Duration) -> io::Result<()> {
        self.close().await?;
        self.reader = None;

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(?status, "MCP server exited");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "MCP server did not exit in time, killing"
                );
                self.child.kill().await
            }
        }
    }
}
