/// Availability gate consulted before every mutation
use crate::config::ProbeConfig;
use crate::errors::{ApiError, ApiResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Answers whether the backing service can be reached
#[async_trait]
pub trait AvailabilityProbe: Send + Sync {
    async fn is_reachable(&self, host: &str, port: u16, timeout: Duration) -> bool;
}

/// TCP connect probe; the connection is dropped right after it opens
pub struct TcpProbe;

#[async_trait]
impl AvailabilityProbe for TcpProbe {
    async fn is_reachable(&self, host: &str, port: u16, timeout: Duration) -> bool {
        matches!(
            tokio::time::timeout(timeout, TcpStream::connect((host, port))).await,
            Ok(Ok(_))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable,
}

/// Probes the configured target on every call; liveness is never cached
#[derive(Clone)]
pub struct AvailabilityGate {
    probe: Arc<dyn AvailabilityProbe>,
    target: ProbeConfig,
}

impl AvailabilityGate {
    pub fn new(probe: Arc<dyn AvailabilityProbe>, target: ProbeConfig) -> Self {
        Self { probe, target }
    }

    pub async fn check(&self) -> Availability {
        let reachable = self
            .probe
            .is_reachable(&self.target.host, self.target.port, self.target.timeout)
            .await;
        if reachable {
            debug!(host = %self.target.host, port = self.target.port, "Backend reachable");
            Availability::Available
        } else {
            warn!(host = %self.target.host, port = self.target.port, "Backend unreachable");
            Availability::Unavailable
        }
    }

    /// `Err(ServiceUnavailable)` unless the probe succeeds
    pub async fn ensure(&self) -> ApiResult<()> {
        match self.check().await {
            Availability::Available => Ok(()),
            Availability::Unavailable => Err(ApiError::ServiceUnavailable(format!(
                "backend {}:{} is not reachable",
                self.target.host, self.target.port
            ))),
        }
    }
}
