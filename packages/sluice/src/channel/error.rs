// channel error types.

use thiserror::Error;

/// Error for receiving from a channel that was closed with nothing left to
/// drain
///
/// This is the only failure a receive operation can observe: the channel was
/// closed, its buffer (if any) is drained, and no sender is queued. Callers
/// are expected to treat it as "no more values will arrive".
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Error)]
#[error("receive on a closed channel")]
pub struct ClosedError;

/// Error for sending into a closed channel
///
/// Carries the message back so the caller can recover it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Error)]
#[error("send on a closed channel")]
pub struct SendError<T> {
    /// The message that could not be sent
    pub msg: T,
}

/// Error for a send with no or limited blocking
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Error)]
pub enum TrySendError<T> {
    /// The channel is closed
    #[error("send on a closed channel")]
    Closed(T),
    /// The operation could not complete immediately or by the deadline
    #[error("channel has no counterpart ready")]
    WouldBlock(T),
}

impl<T> TrySendError<T> {
    /// Recover the message that could not be sent
    pub fn into_msg(self) -> T {
        match self {
            TrySendError::Closed(msg) => msg,
            TrySendError::WouldBlock(msg) => msg,
        }
    }
}

impl<T> From<SendError<T>> for TrySendError<T> {
    fn from(error: SendError<T>) -> Self {
        TrySendError::Closed(error.msg)
    }
}

/// Error for a receive with no or limited blocking
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Error)]
pub enum TryRecvError {
    /// The channel is closed with nothing left to drain
    #[error("receive on a closed channel")]
    Closed,
    /// No value was available immediately or by the deadline
    #[error("channel has no value ready")]
    WouldBlock,
}

impl From<ClosedError> for TryRecvError {
    fn from(ClosedError: ClosedError) -> Self {
        TryRecvError::Closed
    }
}
