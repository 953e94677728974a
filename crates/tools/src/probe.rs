//! Single-call integration probe against a deployed program
//!
//! A probe issues exactly one call through a [`ProgramHandle`] and records
//! the outcome as a [`ProbeResult`]. The handle owns transport and timeout
//! policy; the probe only classifies what comes back.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

/// Why a probe call did not produce a transaction identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("call timed out")]
    Timeout,

    #[error("call rejected: {0}")]
    Rejected(String),

    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),
}

/// Capability to invoke methods on one deployed program
#[async_trait]
pub trait ProgramHandle: Send + Sync {
    /// Name used in log records
    fn label(&self) -> &str;

    /// Invoke `method` and return the transaction identifier
    async fn invoke(&self, method: &str, args: &[Value]) -> Result<String, ProbeError>;
}

/// Outcome of one probe call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub success: bool,
    pub identifier: Option<String>,
    pub error: Option<ProbeError>,
}

impl ProbeResult {
    pub fn succeeded(identifier: String) -> Self {
        Self {
            success: true,
            identifier: Some(identifier),
            error: None,
        }
    }

    pub fn failed(error: ProbeError) -> Self {
        Self {
            success: false,
            identifier: None,
            error: Some(error),
        }
    }

    /// Convert into a `Result` carrying the identifier or the error
    pub fn into_result(self) -> Result<String, ProbeError> {
        match (self.identifier, self.error) {
            (Some(id), None) if self.success => Ok(id),
            (_, Some(err)) => Err(err),
            _ => Err(ProbeError::Rejected("no transaction identifier".to_string())),
        }
    }
}

/// Invoke `method` once through `handle` and record the outcome
pub async fn probe<H>(handle: &H, method: &str, args: &[Value]) -> ProbeResult
where
    H: ProgramHandle + ?Sized,
{
    let outcome = match handle.invoke(method, args).await {
        Ok(id) if id.trim().is_empty() => Err(ProbeError::Rejected(
            "empty transaction identifier".to_string(),
        )),
        other => other,
    };

    match outcome {
        Ok(id) => {
            info!(program = handle.label(), method, signature = %id, "probe succeeded");
            ProbeResult::succeeded(id)
        }
        Err(err) => {
            warn!(program = handle.label(), method, error = %err, "probe failed");
            ProbeResult::failed(err)
        }
    }
}
