use thiserror::Error;

/// Outcome of a call attempted through [`crate::Breaker::call`].
///
/// `Open` means the breaker rejected the call before the supplied future
/// ever ran; `Inner` carries through whatever error the future itself
/// produced.
#[derive(Debug, Clone, Error)]
pub enum BreakerError<E> {
    /// The breaker was Open (or the single HalfOpen probe slot was taken)
    /// and the call was rejected without being attempted.
    #[error("circuit breaker is open")]
    Open,
    /// The call was attempted and its future resolved to `Err`.
    #[error("{0}")]
    Inner(E),
}
