// the unbuffered channel.

use super::{
    completion::{notify_one, Completion, SenderEntry},
    core::Core,
    error::{ClosedError, SendError, TryRecvError, TrySendError},
    future::{RecvFut, SendFut},
};
use crate::select::{SelectRecv, Selectable, Waiter, WaiterToken};
use std::sync::Arc;

/// Rendezvous channel: a send completes only when paired with a receive
///
/// Handles are cheap to clone and share one underlying channel. Values flow
/// between whichever handles send and receive; there is no sender/receiver
/// half split. Senders are matched to receivers in strict arrival order on
/// both sides.
///
/// [`close`](Self::close) cancels parked receivers and refuses operations
/// that arrive afterwards, but deliberately leaves parked senders queued: a
/// receive that arrives after close still drains them.
pub struct Channel<T>(Arc<Core<T>>);

impl<T> Channel<T> {
    /// Construct an open, empty channel.
    pub fn new() -> Self {
        Channel(Arc::new(Core::new(None)))
    }

    /// Send only if a receiver is already parked
    ///
    /// Hands the message directly to the oldest parked receiver. Never
    /// blocks and never queues: if no receiver is parked (or the channel is
    /// closed) the message comes back in the error.
    pub fn try_send(&self, msg: T) -> Result<(), TrySendError<T>> {
        let mut state = self.0.lock();
        let msg = match state.hand_to_receiver(msg) {
            Ok(()) => return Ok(()),
            Err(back) => back,
        };
        if state.closed {
            Err(TrySendError::Closed(msg))
        } else {
            Err(TrySendError::WouldBlock(msg))
        }
    }

    /// Send a message
    ///
    /// If a receiver is parked the hand-off happens here and the returned
    /// future is already resolved. Otherwise the message is queued (one
    /// parked select, if any, is notified) and the future resolves when a
    /// receiver takes it. If the channel is closed the future resolves to
    /// [`SendError`] carrying the message back.
    pub fn send(&self, msg: T) -> SendFut<T> {
        let mut state = self.0.lock();
        let msg = match state.hand_to_receiver(msg) {
            Ok(()) => return SendFut::ready(Ok(())),
            Err(back) => back,
        };
        if state.closed {
            return SendFut::ready(Err(SendError { msg }));
        }
        let done = Completion::new();
        let token = state.senders.enqueue(SenderEntry {
            msg,
            done: Arc::clone(&done),
        });
        notify_one(&mut state.select_waiters);
        drop(state);
        SendFut::queued(Arc::clone(&self.0), done, token)
    }

    /// Receive only if a sender is already queued
    ///
    /// Never blocks and never queues. Note that a queued sender satisfies
    /// this even after [`close`](Self::close): close drains in-flight sends
    /// rather than discarding them.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let mut state = self.0.lock();
        if let Some(msg) = state.take_queued_sender() {
            return Ok(msg);
        }
        if state.closed {
            Err(TryRecvError::Closed)
        } else {
            Err(TryRecvError::WouldBlock)
        }
    }

    /// Receive a message
    ///
    /// If a sender is queued its value is taken here (completing that send)
    /// and the returned future is already resolved — even on a closed
    /// channel. Otherwise, on a closed channel the future resolves to
    /// [`ClosedError`]; on an open one the receive parks until a sender
    /// arrives or the channel is closed.
    pub fn recv(&self) -> RecvFut<T> {
        let mut state = self.0.lock();
        if let Some(msg) = state.take_queued_sender() {
            return RecvFut::ready(Ok(msg));
        }
        if state.closed {
            return RecvFut::ready(Err(ClosedError));
        }
        let cell = Completion::new();
        let token = state.receivers.enqueue(Arc::clone(&cell));
        drop(state);
        RecvFut::queued(Arc::clone(&self.0), cell, token)
    }

    /// Close the channel
    ///
    /// Idempotent. Every parked receive resolves to [`ClosedError`]. Parked
    /// sends are not cancelled: their values stay queued and a later receive
    /// still takes them, so nothing already in flight is lost. Only once the
    /// sender queue is drained do receives start failing.
    pub fn close(&self) {
        self.0.close();
    }

    #[cfg(test)]
    pub(crate) fn select_waiter_count(&self) -> usize {
        self.0.lock().select_waiters.len()
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Channel(Arc::clone(&self.0))
    }
}

impl<T: Send> Selectable for Channel<T> {
    fn add_waiter(&self, waiter: &Waiter) -> WaiterToken {
        let mut state = self.0.lock();
        let token = state.select_waiters.enqueue(Arc::clone(&waiter.0));
        // a select registering late must not miss an already-ready channel
        if !state.senders.is_empty() {
            let _ = waiter.0.complete(());
        }
        WaiterToken(token)
    }

    fn remove_waiter(&self, token: WaiterToken) {
        self.0.lock().select_waiters.remove(token.0);
    }
}

impl<T: Send> SelectRecv<T> for Channel<T> {
    fn recv_ready(&self) -> Option<T> {
        self.try_recv().ok()
    }
}
