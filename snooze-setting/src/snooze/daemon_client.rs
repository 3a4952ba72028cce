// Daemon client used by the CLI
// Handles communication with snoozed over its Unix socket

use super::config::Config;
use super::protocol::{
    deserialize_message, serialize_message, DaemonErrorCode, DaemonRequest, DaemonResponse,
    PROTOCOL_VERSION,
};
use crate::cli_paths::resolve_daemon_path;
use anyhow::{anyhow, bail, Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::process::{Command, Stdio};
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_secs(10);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection to a running daemon, handshake already done
pub struct DaemonClient {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
}

impl DaemonClient {
    /// Connect to an already-running daemon
    pub fn connect(config: &Config) -> Result<Self> {
        let stream = UnixStream::connect(&config.socket_path).with_context(|| {
            format!(
                "Failed to connect to daemon at {}",
                config.socket_path.display()
            )
        })?;
        Self::from_stream(stream)
    }

    /// Connect, starting the daemon first if its socket is not there
    pub fn connect_or_start(config: &Config) -> Result<Self> {
        if let Ok(stream) = UnixStream::connect(&config.socket_path) {
            return Self::from_stream(stream);
        }

        log::info!("Daemon not running, attempting to start...");

        let daemon_path = resolve_daemon_path().ok_or_else(|| {
            anyhow!("Could not find the snoozed binary. Install it next to the snooze CLI.")
        })?;

        // The daemon reads the same environment, so it lands on the same paths
        Command::new(&daemon_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start daemon at {}", daemon_path.display()))?;

        // Wait for the socket to appear (up to 5 seconds)
        for _ in 0..50 {
            std::thread::sleep(Duration::from_millis(100));
            if let Ok(stream) = UnixStream::connect(&config.socket_path) {
                log::info!("Daemon started successfully");
                return Self::from_stream(stream);
            }
        }

        bail!(
            "Timed out waiting for daemon to start. Socket not found at: {}",
            config.socket_path.display()
        )
    }

    fn from_stream(stream: UnixStream) -> Result<Self> {
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
        let writer = stream.try_clone().context("Failed to clone daemon stream")?;

        let mut client = Self {
            reader: BufReader::new(stream),
            writer,
        };
        client.handshake()?;
        Ok(client)
    }

    fn handshake(&mut self) -> Result<()> {
        let response = self.roundtrip(&DaemonRequest::Handshake {
            client_version: PROTOCOL_VERSION,
        })?;

        match response {
            DaemonResponse::Handshake { .. } => Ok(()),
            DaemonResponse::Error {
                code: DaemonErrorCode::VersionMismatch,
                message,
            } => Err(anyhow!("Protocol version mismatch: {}", message)),
            other => Err(anyhow!("Expected handshake response, got: {:?}", other)),
        }
    }

    fn roundtrip(&mut self, request: &DaemonRequest) -> Result<DaemonResponse> {
        let bytes = serialize_message(request)?;
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            bail!("Daemon closed connection unexpectedly");
        }

        deserialize_message(line.as_bytes()).with_context(|| {
            format!("Failed to parse daemon response (line: {})", line.trim())
        })
    }

    /// Send one request and wait for its response
    pub fn send(&mut self, request: DaemonRequest) -> Result<DaemonResponse> {
        self.roundtrip(&request)
    }
}

/// Split an error response from the expected variant
pub fn response_to_result<T, F>(response: DaemonResponse, extract: F) -> Result<T>
where
    F: FnOnce(DaemonResponse) -> Option<T>,
{
    if let DaemonResponse::Error { message, .. } = response {
        bail!(message);
    }

    extract(response).ok_or_else(|| anyhow!("Unexpected response from daemon"))
}
