// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the daemon's API.
//!
//! Sends HTTP/1.1 requests over TCP with Content-Length framing — one
//! connection per request, no keep-alive, mirroring the daemon's listener.

use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use sx_daemon::lifecycle::Paths;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon not running (connect failed: {0})")]
    NotRunning(String),
    #[error("request timed out")]
    Timeout,
    #[error("connection error: {0}")]
    Io(String),
    #[error("daemon returned {status}: {message}")]
    Api { status: u16, message: String },
}

impl ClientError {
    pub fn is_not_running(&self) -> bool {
        matches!(self, ClientError::NotRunning(_))
    }
}

pub struct DaemonClient {
    addr: String,
}

impl DaemonClient {
    /// Resolve the daemon address from env/config.
    pub fn from_env() -> anyhow::Result<Self> {
        let port = match sx_daemon::env::http_port() {
            Some(port) => port,
            None => {
                let paths = Paths::resolve()?;
                sx_core::Config::load(&paths.config_file())?.http_port
            }
        };
        Ok(Self { addr: format!("127.0.0.1:{}", port) })
    }

    pub async fn get(&self, path: &str) -> Result<serde_json::Value, ClientError> {
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path);
        self.request(&request).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ClientError> {
        let payload = body.to_string();
        let request = format!(
            "POST {} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            path,
            payload.len(),
            payload
        );
        self.request(&request).await
    }

    /// Connect, send, and read with a timeout covering the whole exchange.
    async fn request(&self, raw: &str) -> Result<serde_json::Value, ClientError> {
        tokio::time::timeout(Duration::from_secs(30), self.send(raw))
            .await
            .map_err(|_| ClientError::Timeout)?
    }

    async fn send(&self, raw: &str) -> Result<serde_json::Value, ClientError> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| ClientError::NotRunning(e.to_string()))?;
        stream.write_all(raw.as_bytes()).await.map_err(|e| ClientError::Io(e.to_string()))?;

        let mut reader = BufReader::new(&mut stream);

        let mut status_line = String::new();
        reader.read_line(&mut status_line).await.map_err(|e| ClientError::Io(e.to_string()))?;
        let status: u16 = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await.map_err(|e| ClientError::Io(e.to_string()))?;
            if line == "\r\n" || line == "\n" || line.is_empty() {
                break;
            }
            let lower = line.to_ascii_lowercase();
            if let Some(value) = lower.strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }

        let mut body = vec![0u8; content_length];
        if content_length > 0 {
            reader.read_exact(&mut body).await.map_err(|e| ClientError::Io(e.to_string()))?;
        }
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);

        if (200..300).contains(&status) {
            Ok(json)
        } else {
            let message = json
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
                .to_string();
            Err(ClientError::Api { status, message })
        }
    }
}
