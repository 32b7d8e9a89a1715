// future types for channel operations.
//
// send and recv register their waiter node with the channel eagerly, at the
// call that creates the future. the future itself only decides how to wait:
// await it on an executor, or block the calling thread through the polling
// module. a future abandoned before resolving (rescind/abort, or drop)
// unlinks its node so the channel never holds a dangling waiter.

use super::{
    completion::Completion,
    core::Core,
    error::{ClosedError, SendError, TryRecvError, TrySendError},
    polling::{self, Timeout},
    wait_queue::WaitToken,
};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::{Duration, Instant},
};

/// Future for sending a message into a channel
///
/// Created by `send` on either channel type. The send operation is already
/// registered when this future exists: a counterpart may take the message
/// before the future is polled at all. The future resolves once the message
/// has been taken (or buffered), or to [`SendError`] if the channel was
/// closed when the send was made.
///
/// Awaiting suspends the task; [`block`](Self::block) parks the thread
/// instead. Both wait on the same registration. Dropping an unresolved
/// future rescinds the send.
pub struct SendFut<T> {
    inner: Option<SendInner<T>>,
}

enum SendInner<T> {
    Ready(Result<(), SendError<T>>),
    Queued {
        chan: Arc<Core<T>>,
        done: Arc<Completion<()>>,
        token: WaitToken,
    },
}

impl<T> Unpin for SendFut<T> {}

impl<T> SendFut<T> {
    pub(crate) fn ready(result: Result<(), SendError<T>>) -> Self {
        SendFut {
            inner: Some(SendInner::Ready(result)),
        }
    }

    pub(crate) fn queued(
        chan: Arc<Core<T>>,
        done: Arc<Completion<()>>,
        token: WaitToken,
    ) -> Self {
        SendFut {
            inner: Some(SendInner::Queued { chan, done, token }),
        }
    }

    /// Block until the message is taken or the channel is found closed
    ///
    /// Panics if this future already resolved or rescinded.
    pub fn block(&mut self) -> Result<(), SendError<T>> {
        assert!(!self.is_terminated(), "SendFut::block after completion");
        match polling::poll(self, Timeout::Never) {
            Ok(result) => result,
            Err(()) => unreachable!("poll timed out with Timeout::Never"),
        }
    }

    /// Block until the message is taken, the channel is found closed, or the
    /// timeout elapses
    ///
    /// On timeout the send is rescinded and the message handed back in
    /// [`TrySendError::WouldBlock`]; the operation is no longer queued.
    /// Panics if this future already resolved or rescinded.
    pub fn block_timeout(&mut self, timeout: Duration) -> Result<(), TrySendError<T>> {
        self.block_deadline(Instant::now() + timeout)
    }

    /// Deadline form of [`block_timeout`](Self::block_timeout)
    pub fn block_deadline(&mut self, deadline: Instant) -> Result<(), TrySendError<T>> {
        assert!(!self.is_terminated(), "SendFut::block_deadline after completion");
        match polling::poll(self, Timeout::At(deadline)) {
            Ok(result) => result.map_err(TrySendError::from),
            Err(()) => self.settle_unresolved(),
        }
    }

    /// Resolve now or not at all
    ///
    /// Like [`block_deadline`](Self::block_deadline) with an already-elapsed
    /// deadline: a send that cannot complete immediately is rescinded and the
    /// message handed back. Panics if this future already resolved or
    /// rescinded.
    pub fn try_now(&mut self) -> Result<(), TrySendError<T>> {
        assert!(!self.is_terminated(), "SendFut::try_now after completion");
        match polling::poll(self, Timeout::NonBlocking) {
            Ok(result) => result.map_err(TrySendError::from),
            Err(()) => self.settle_unresolved(),
        }
    }

    /// Abandon the send and recover the message, if it was not yet taken
    ///
    /// Returns `None` if the message was already delivered (or this future
    /// already resolved or rescinded).
    pub fn rescind(&mut self) -> Option<T> {
        match self.inner.take()? {
            SendInner::Ready(Ok(())) => None,
            SendInner::Ready(Err(SendError { msg })) => Some(msg),
            SendInner::Queued { chan, done, token } => match chan.unlink_sender(token) {
                Some(msg) => Some(msg),
                // lost the race: a receiver took the message first
                None => {
                    let _ = done.take_now();
                    None
                }
            },
        }
    }

    /// Whether this future already resolved or rescinded
    pub fn is_terminated(&self) -> bool {
        self.inner.is_none()
    }

    // the poll timed out while the future was still queued: rescind, unless
    // a receiver took the message in the meantime.
    fn settle_unresolved(&mut self) -> Result<(), TrySendError<T>> {
        match self.rescind() {
            Some(msg) => Err(TrySendError::WouldBlock(msg)),
            None => Ok(()),
        }
    }
}

impl<T> Future for SendFut<T> {
    type Output = Result<(), SendError<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.inner {
            // for implementation of FusedFuture
            None => Poll::Pending,
            Some(SendInner::Ready(_)) => {
                let Some(SendInner::Ready(result)) = this.inner.take() else {
                    unreachable!();
                };
                Poll::Ready(result)
            }
            Some(SendInner::Queued { done, .. }) => match done.poll_take(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(Ok(())) => {
                    this.inner = None;
                    Poll::Ready(Ok(()))
                }
                Poll::Ready(Err(_)) => unreachable!("queued senders are never cancelled"),
            },
        }
    }
}

#[cfg(feature = "futures")]
impl<T> futures::future::FusedFuture for SendFut<T> {
    fn is_terminated(&self) -> bool {
        Self::is_terminated(self)
    }
}

impl<T> Drop for SendFut<T> {
    fn drop(&mut self) {
        // to make sure an unresolved send leaves no node behind
        let _ = self.rescind();
    }
}

/// Future for receiving a message from a channel
///
/// Created by `recv` on either channel type. The receive operation is
/// already registered when this future exists. Resolves to the received
/// message, or to [`ClosedError`] if the channel is closed with nothing left
/// to drain (including when it is closed while this receive is parked).
///
/// Awaiting suspends the task; [`block`](Self::block) parks the thread
/// instead. Dropping an unresolved future aborts the receive.
pub struct RecvFut<T> {
    inner: Option<RecvInner<T>>,
}

enum RecvInner<T> {
    Ready(Result<T, ClosedError>),
    Queued {
        chan: Arc<Core<T>>,
        cell: Arc<Completion<T>>,
        token: WaitToken,
    },
}

impl<T> Unpin for RecvFut<T> {}

impl<T> RecvFut<T> {
    pub(crate) fn ready(result: Result<T, ClosedError>) -> Self {
        RecvFut {
            inner: Some(RecvInner::Ready(result)),
        }
    }

    pub(crate) fn queued(
        chan: Arc<Core<T>>,
        cell: Arc<Completion<T>>,
        token: WaitToken,
    ) -> Self {
        RecvFut {
            inner: Some(RecvInner::Queued { chan, cell, token }),
        }
    }

    /// Block until a message arrives or the channel is closed out
    ///
    /// Panics if this future already resolved or aborted.
    pub fn block(&mut self) -> Result<T, ClosedError> {
        assert!(!self.is_terminated(), "RecvFut::block after completion");
        match polling::poll(self, Timeout::Never) {
            Ok(result) => result,
            Err(()) => unreachable!("poll timed out with Timeout::Never"),
        }
    }

    /// Block until a message arrives, the channel is closed out, or the
    /// timeout elapses
    ///
    /// On timeout the receive is aborted and [`TryRecvError::WouldBlock`]
    /// returned; the operation is no longer queued. Panics if this future
    /// already resolved or aborted.
    pub fn block_timeout(&mut self, timeout: Duration) -> Result<T, TryRecvError> {
        self.block_deadline(Instant::now() + timeout)
    }

    /// Deadline form of [`block_timeout`](Self::block_timeout)
    pub fn block_deadline(&mut self, deadline: Instant) -> Result<T, TryRecvError> {
        assert!(!self.is_terminated(), "RecvFut::block_deadline after completion");
        match polling::poll(self, Timeout::At(deadline)) {
            Ok(result) => result.map_err(TryRecvError::from),
            Err(()) => self.settle_unresolved(),
        }
    }

    /// Resolve now or not at all
    ///
    /// Panics if this future already resolved or aborted.
    pub fn try_now(&mut self) -> Result<T, TryRecvError> {
        assert!(!self.is_terminated(), "RecvFut::try_now after completion");
        match polling::poll(self, Timeout::NonBlocking) {
            Ok(result) => result.map_err(TryRecvError::from),
            Err(()) => self.settle_unresolved(),
        }
    }

    /// Abandon the receive
    ///
    /// A message handed to this receive in the race window is dropped. Does
    /// nothing if this future already resolved or aborted; never panics.
    pub fn abort(&mut self) {
        if let Some(RecvInner::Queued { chan, cell, token }) = self.inner.take() {
            chan.unlink_receiver(token);
            let _ = cell.take_now();
        }
    }

    /// Whether this future already resolved or aborted
    pub fn is_terminated(&self) -> bool {
        self.inner.is_none()
    }

    // the poll timed out while the receive was still queued: abort, unless a
    // message (or the close) arrived in the meantime.
    fn settle_unresolved(&mut self) -> Result<T, TryRecvError> {
        let Some(RecvInner::Queued { chan, cell, token }) = self.inner.take() else {
            unreachable!("timed out on a resolved future");
        };
        chan.unlink_receiver(token);
        match cell.take_now() {
            None => Err(TryRecvError::WouldBlock),
            Some(Ok(msg)) => Ok(msg),
            Some(Err(ClosedError)) => Err(TryRecvError::Closed),
        }
    }
}

impl<T> Future for RecvFut<T> {
    type Output = Result<T, ClosedError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.inner {
            // for implementation of FusedFuture
            None => Poll::Pending,
            Some(RecvInner::Ready(_)) => {
                let Some(RecvInner::Ready(result)) = this.inner.take() else {
                    unreachable!();
                };
                Poll::Ready(result)
            }
            Some(RecvInner::Queued { cell, .. }) => match cell.poll_take(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(result) => {
                    this.inner = None;
                    Poll::Ready(result)
                }
            },
        }
    }
}

#[cfg(feature = "futures")]
impl<T> futures::future::FusedFuture for RecvFut<T> {
    fn is_terminated(&self) -> bool {
        Self::is_terminated(self)
    }
}

impl<T> Drop for RecvFut<T> {
    fn drop(&mut self) {
        // to make sure an unresolved receive leaves no node behind
        self.abort();
    }
}
