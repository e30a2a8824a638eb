// error.rs — error taxonomy for the engine (spec §7).
//
// Handling policy, not type, is what distinguishes these: transient I/O is
// retried and folded into GatewayError::Unknown before it ever reaches the
// OMS; recoverable rejects flow through as GatewayError::Rejected and only
// count toward the reject streak; structural rejects and invariant
// violations become EngineError variants that the orchestrator turns into
// an immediate halt.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited")]
    RateLimited,

    #[error("order rejected (recoverable): {0}")]
    Rejected(String),

    #[error("order rejected (structural): {0}")]
    Structural(String),

    #[error("request timed out, outcome unknown")]
    Unknown,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("startup failure: {0}")]
    Startup(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
