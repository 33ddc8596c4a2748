use thiserror::Error;

/// Failures internal to the dispatcher itself, as opposed to upstream
/// outcomes (which are always represented, never propagated as `Err` —
/// see [`crate::executor::UpstreamOutcome`]).
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to read request body: {0}")]
    BodyRead(String),
}
