// Error Types - Engine failure taxonomy
// Configuration errors stop a job before it starts, numerical errors stop it mid-run

use thiserror::Error;

use crate::bodies::BodyId;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    // ===== Configuration Errors =====
    #[error("Central body {0} not found")]
    CentralBodyNotFound(BodyId),

    #[error("Central body {id} cannot be an integration center (GM = {gm})")]
    InvalidCentralBody { id: BodyId, gm: f64 },

    #[error("Invalid request field `{field}`: {reason}")]
    InvalidRequest { field: &'static str, reason: String },

    #[error("Invalid body {id}: {reason}")]
    InvalidBody { id: BodyId, reason: String },

    #[error("Malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    // ===== Numerical Errors =====
    /// NaN or Inf appeared in the integrated state
    #[error("Numerical divergence at t = {time:.3} s while integrating about body {central_body}")]
    NumericalDivergence { time: f64, central_body: BodyId },

    /// A step panicked; the job is abandoned but the engine keeps running
    #[error("Propagation aborted: {0}")]
    JobPanicked(String),

    // ===== Plumbing =====
    #[error("Engine channel closed")]
    ChannelClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn invalid_request(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            field,
            reason: reason.into(),
        }
    }

    /// True for errors reported before a job takes its first step.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::CentralBodyNotFound(_)
                | Self::InvalidCentralBody { .. }
                | Self::InvalidRequest { .. }
                | Self::InvalidBody { .. }
                | Self::MalformedMessage(_)
        )
    }
}
