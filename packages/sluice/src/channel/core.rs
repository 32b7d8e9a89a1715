// state shared by the handles, futures, and select registrations of one
// channel. the exposed channel types are wrappers around this.

use super::{
    completion::{Completion, SenderEntry},
    wait_queue::{WaitQueue, WaitToken},
};
use crate::util::RingQueue;
use std::sync::{Arc, Mutex, MutexGuard};

// one channel's shared state. both channel flavors use it; the rendezvous
// flavor has no buffer.
pub(crate) struct Core<T> {
    lockable: Mutex<State<T>>,
}

// channel state guarded by the lock. a node in a wait queue always implies
// a pending completion cell: whoever dequeues or removes a node resolves (or
// owns) its cell before the lock is released.
pub(crate) struct State<T> {
    // one-way transition, flipped by close
    pub(crate) closed: bool,
    // buffered values, present only for the buffered flavor
    pub(crate) buffer: Option<RingQueue<T>>,
    // values waiting to be taken, in arrival order
    pub(crate) senders: WaitQueue<SenderEntry<T>>,
    // receives waiting for a value, in arrival order
    pub(crate) receivers: WaitQueue<Arc<Completion<T>>>,
    // selects parked on this channel
    pub(crate) select_waiters: WaitQueue<Arc<Completion<()>>>,
}

impl<T> Core<T> {
    pub(crate) fn new(buffer: Option<RingQueue<T>>) -> Self {
        Core {
            lockable: Mutex::new(State {
                closed: false,
                buffer,
                senders: WaitQueue::new(),
                receivers: WaitQueue::new(),
                select_waiters: WaitQueue::new(),
            }),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.lockable.lock().unwrap()
    }

    // close the channel: refuse operations from here on and cancel every
    // parked receive. queued senders (and any buffered values) are left for
    // later receives to drain. idempotent.
    pub(crate) fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let mut cancelled = 0usize;
        while let Some(rx) = state.receivers.dequeue() {
            rx.cancel();
            cancelled += 1;
        }
        trace!(
            cancelled_receivers = cancelled,
            queued_senders = state.senders.len(),
            "channel closed"
        );
    }

    // remove the named sender node, returning its message if it was still
    // queued. None means a receiver already took it.
    pub(crate) fn unlink_sender(&self, token: WaitToken) -> Option<T> {
        self.lock().senders.remove(token).map(|entry| entry.msg)
    }

    // remove the named receiver node. no-op if it already left the queue.
    pub(crate) fn unlink_receiver(&self, token: WaitToken) {
        self.lock().receivers.remove(token);
    }
}

impl<T> State<T> {
    // hand the message to the oldest parked receiver, or give it back if no
    // receiver is parked.
    pub(crate) fn hand_to_receiver(&mut self, msg: T) -> Result<(), T> {
        let mut msg = msg;
        while let Some(rx) = self.receivers.dequeue() {
            match rx.complete(msg) {
                Ok(()) => return Ok(()),
                Err(back) => msg = back,
            }
        }
        Err(msg)
    }

    // take the oldest queued sender's message, completing that send.
    pub(crate) fn take_queued_sender(&mut self) -> Option<T> {
        let SenderEntry { msg, done } = self.senders.dequeue()?;
        let _ = done.complete(());
        Some(msg)
    }

    // the buffer, which the buffered flavor always has.
    pub(crate) fn buffer_mut(&mut self) -> &mut RingQueue<T> {
        self.buffer.as_mut().expect("channel has no buffer")
    }

    pub(crate) fn buffer_ref(&self) -> &RingQueue<T> {
        self.buffer.as_ref().expect("channel has no buffer")
    }
}
