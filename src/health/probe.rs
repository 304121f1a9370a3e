//! Single-shot liveness probes.
//!
//! # Responsibilities
//! - Connect to an endpoint within the connect deadline
//! - Optionally run the PING/PONG exchange within the read deadline
//! - Release the connection on every exit path

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

use crate::config::ProbeConfig;
use crate::endpoint::Endpoint;

/// Challenge written after connecting.
pub const LIVENESS_CHALLENGE: &[u8; 6] = b"PING\r\n";

/// Reply expected from a live endpoint.
pub const LIVENESS_REPLY: &[u8; 4] = b"PONG";

/// A bounded-time liveness check against one endpoint.
pub trait Probe: Send + Sync + 'static {
    /// Returns `true` if the endpoint is healthy. Never errors; every failure
    /// mode maps to `false`.
    fn probe(&self, endpoint: &Endpoint) -> impl Future<Output = bool> + Send;
}

/// Why a probe failed. Only used for logging.
#[derive(Debug, thiserror::Error)]
enum ProbeFailure {
    #[error("connect timed out")]
    ConnectTimeout,
    #[error("connect failed: {0}")]
    Connect(std::io::Error),
    #[error("liveness exchange timed out")]
    ReadTimeout,
    #[error("liveness exchange failed: {0}")]
    Exchange(std::io::Error),
    #[error("unexpected reply {0:?}")]
    UnexpectedReply(String),
}

/// TCP probe with optional application-level PING/PONG check.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    connect_timeout: Duration,
    read_timeout: Duration,
    application_check: bool,
}

impl TcpProbe {
    pub fn new(connect_timeout: Duration, read_timeout: Duration, application_check: bool) -> Self {
        Self {
            connect_timeout,
            read_timeout,
            application_check,
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(
            config.connect_timeout(),
            config.read_timeout(),
            config.application_check,
        )
    }

    async fn check(&self, endpoint: &Endpoint) -> Result<(), ProbeFailure> {
        let started = Instant::now();
        let mut stream = match time::timeout(
            self.connect_timeout,
            TcpStream::connect(endpoint.connect_addr()),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ProbeFailure::Connect(e)),
            Err(_) => return Err(ProbeFailure::ConnectTimeout),
        };
        tracing::trace!(
            endpoint = %endpoint,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "TCP connect succeeded"
        );

        if !self.application_check {
            return Ok(());
        }

        match time::timeout(self.read_timeout, exchange(&mut stream)).await {
            Ok(Ok(reply)) if &reply == LIVENESS_REPLY => {
                tracing::trace!(endpoint = %endpoint, "Application check passed");
                Ok(())
            }
            Ok(Ok(reply)) => Err(ProbeFailure::UnexpectedReply(
                String::from_utf8_lossy(&reply).into_owned(),
            )),
            Ok(Err(e)) => Err(ProbeFailure::Exchange(e)),
            Err(_) => Err(ProbeFailure::ReadTimeout),
        }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::from_config(&ProbeConfig::default())
    }
}

async fn exchange(stream: &mut TcpStream) -> std::io::Result<[u8; 4]> {
    stream.write_all(LIVENESS_CHALLENGE).await?;
    stream.flush().await?;
    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await?;
    Ok(reply)
}

impl Probe for TcpProbe {
    async fn probe(&self, endpoint: &Endpoint) -> bool {
        let started = Instant::now();
        match self.check(endpoint).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(
                    endpoint = %endpoint,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "Probe failed"
                );
                false
            }
        }
    }
}
