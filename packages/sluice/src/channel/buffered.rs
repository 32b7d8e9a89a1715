// the buffered channel.

use super::{
    completion::{notify_one, Completion, SenderEntry},
    core::Core,
    error::{ClosedError, SendError, TryRecvError, TrySendError},
    future::{RecvFut, SendFut},
};
use crate::{
    select::{SelectRecv, Selectable, Waiter, WaiterToken},
    util::RingQueue,
};
use std::sync::Arc;

/// Bounded channel: sends only park once the buffer is full
///
/// Same contract as [`Channel`](super::Channel) with a fixed-capacity buffer
/// between senders and receivers. A send into a non-full buffer completes
/// immediately; a receive from a non-empty buffer completes immediately and
/// pulls a parked sender's value into the freed slot. When the buffer is
/// empty a send hands off directly to a parked receiver, bypassing the
/// buffer.
///
/// Values already buffered remain receivable after [`close`](Self::close);
/// receives only start failing once the buffer is drained and no sender is
/// queued.
pub struct BufferedChannel<T>(Arc<Core<T>>);

impl<T> BufferedChannel<T> {
    /// Construct an open, empty channel holding up to `capacity` values.
    ///
    /// Panics if `capacity` is zero (use [`Channel`](super::Channel) for
    /// rendezvous behavior).
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "BufferedChannel capacity must be at least 1");
        BufferedChannel(Arc::new(Core::new(Some(RingQueue::new(capacity)))))
    }

    /// Maximum number of buffered values.
    pub fn capacity(&self) -> usize {
        self.0.lock().buffer_ref().capacity()
    }

    /// Send only if it can complete immediately
    ///
    /// Succeeds when a receiver is parked (direct hand-off) or the buffer
    /// has room. Never blocks and never queues.
    pub fn try_send(&self, msg: T) -> Result<(), TrySendError<T>> {
        let mut state = self.0.lock();
        let mut msg = msg;
        // empty buffer with a parked receiver: hand off directly
        if state.buffer_ref().is_empty() {
            msg = match state.hand_to_receiver(msg) {
                Ok(()) => return Ok(()),
                Err(back) => back,
            };
        }
        if state.closed {
            return Err(TrySendError::Closed(msg));
        }
        if !state.buffer_ref().is_full() {
            state.buffer_mut().enqueue(msg);
            notify_one(&mut state.select_waiters);
            return Ok(());
        }
        Err(TrySendError::WouldBlock(msg))
    }

    /// Send a message
    ///
    /// The returned future is already resolved unless the buffer is full, in
    /// which case the message queues behind it and the future resolves once
    /// a receive frees a slot. If the channel is closed the future resolves
    /// to [`SendError`] carrying the message back.
    pub fn send(&self, msg: T) -> SendFut<T> {
        let mut state = self.0.lock();
        let mut msg = msg;
        if state.buffer_ref().is_empty() {
            msg = match state.hand_to_receiver(msg) {
                Ok(()) => return SendFut::ready(Ok(())),
                Err(back) => back,
            };
        }
        if state.closed {
            return SendFut::ready(Err(SendError { msg }));
        }
        if !state.buffer_ref().is_full() {
            state.buffer_mut().enqueue(msg);
            notify_one(&mut state.select_waiters);
            return SendFut::ready(Ok(()));
        }
        // buffer full: park behind it
        let done = Completion::new();
        let token = state.senders.enqueue(SenderEntry {
            msg,
            done: Arc::clone(&done),
        });
        drop(state);
        SendFut::queued(Arc::clone(&self.0), done, token)
    }

    /// Receive only if a value is already buffered
    ///
    /// Never blocks and never queues. Buffered values are still taken after
    /// [`close`](Self::close); the error is [`TryRecvError::Closed`] only
    /// once the channel is both closed and drained.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let mut state = self.0.lock();
        if !state.buffer_ref().is_empty() {
            return Ok(Self::take_buffered(&mut state));
        }
        if state.closed {
            Err(TryRecvError::Closed)
        } else {
            Err(TryRecvError::WouldBlock)
        }
    }

    /// Receive a message
    ///
    /// If the buffer is non-empty the returned future is already resolved —
    /// even on a closed channel. Otherwise, on a closed channel the future
    /// resolves to [`ClosedError`]; on an open one the receive parks until a
    /// value arrives or the channel is closed.
    pub fn recv(&self) -> RecvFut<T> {
        let mut state = self.0.lock();
        if !state.buffer_ref().is_empty() {
            return RecvFut::ready(Ok(Self::take_buffered(&mut state)));
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
    /// sends and buffered values are untouched: later receives drain the
    /// buffer (and with it the parked senders) before failing.
    pub fn close(&self) {
        self.0.close();
    }

    // pop the oldest buffered value and pull a parked sender's value into
    // the freed slot, completing that send.
    fn take_buffered(state: &mut super::core::State<T>) -> T {
        let msg = state.buffer_mut().dequeue();
        if let Some(queued) = state.take_queued_sender() {
            state.buffer_mut().enqueue(queued);
        }
        msg
    }

    #[cfg(test)]
    pub(crate) fn select_waiter_count(&self) -> usize {
        self.0.lock().select_waiters.len()
    }
}

impl<T> Clone for BufferedChannel<T> {
    fn clone(&self) -> Self {
        BufferedChannel(Arc::clone(&self.0))
    }
}

impl<T: Send> Selectable for BufferedChannel<T> {
    fn add_waiter(&self, waiter: &Waiter) -> WaiterToken {
        let mut state = self.0.lock();
        let token = state.select_waiters.enqueue(Arc::clone(&waiter.0));
        // a select registering late must not miss an already-ready channel
        if !state.buffer_ref().is_empty() {
            let _ = waiter.0.complete(());
        }
        WaiterToken(token)
    }

    fn remove_waiter(&self, token: WaiterToken) {
        self.0.lock().select_waiters.remove(token.0);
    }
}

impl<T: Send> SelectRecv<T> for BufferedChannel<T> {
    fn recv_ready(&self) -> Option<T> {
        self.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{thread, time::Duration};

    #[test]
    #[should_panic(expected = "capacity must be at least 1")]
    fn zero_capacity_panics() {
        BufferedChannel::<u32>::new(0);
    }

    #[test]
    fn send_fills_buffer_then_parks() {
        let chan = BufferedChannel::new(1);
        assert_eq!(chan.send(1).block(), Ok(()));

        let mut parked = chan.send(2);
        assert!(!parked.is_terminated());

        // the first receive frees the slot, completing the parked send
        assert_eq!(chan.recv().block(), Ok(1));
        assert_eq!(parked.try_now(), Ok(()));
        assert_eq!(chan.recv().block(), Ok(2));
    }

    #[test]
    fn try_send_on_full_buffer() {
        let chan = BufferedChannel::new(2);
        assert_eq!(chan.try_send(1), Ok(()));
        assert_eq!(chan.try_send(2), Ok(()));
        assert_eq!(chan.try_send(3), Err(TrySendError::WouldBlock(3)));
    }

    #[test]
    fn buffer_conservation_under_backlog() {
        let chan = BufferedChannel::new(3);
        for i in 0..3 {
            assert_eq!(chan.send(i).block(), Ok(()));
        }
        let mut fourth = chan.send(3);
        let mut fifth = chan.send(4);
        assert!(!fourth.is_terminated());
        assert!(!fifth.is_terminated());

        assert_eq!(chan.recv().block(), Ok(0));
        assert_eq!(fourth.try_now(), Ok(()));
        assert!(!fifth.is_terminated());

        for expect in 1..5 {
            assert_eq!(chan.recv().block(), Ok(expect));
        }
        assert_eq!(fifth.try_now(), Ok(()));
    }

    #[test]
    fn fifo_through_buffer_and_backlog() {
        let chan = BufferedChannel::new(2);
        assert_eq!(chan.try_send('a'), Ok(()));
        assert_eq!(chan.try_send('b'), Ok(()));
        let _parked = chan.send('c');

        assert_eq!(chan.try_recv(), Ok('a'));
        assert_eq!(chan.try_recv(), Ok('b'));
        assert_eq!(chan.try_recv(), Ok('c'));
        assert_eq!(chan.try_recv(), Err(TryRecvError::WouldBlock));
    }

    #[test]
    fn direct_handoff_to_parked_receiver() {
        let chan = BufferedChannel::new(4);
        let rx = chan.clone();
        let join = thread::spawn(move || rx.recv().block());

        thread::sleep(Duration::from_millis(20));
        assert_eq!(chan.send(7).block(), Ok(()));
        assert_eq!(join.join().unwrap(), Ok(7));
        // the message went straight to the receiver, not through the buffer
        assert_eq!(chan.try_recv(), Err(TryRecvError::WouldBlock));
    }

    #[test]
    fn buffered_values_remain_receivable_after_close() {
        let chan = BufferedChannel::new(2);
        assert_eq!(chan.try_send(1), Ok(()));
        assert_eq!(chan.try_send(2), Ok(()));
        chan.close();

        assert_eq!(chan.try_send(3), Err(TrySendError::Closed(3)));
        assert_eq!(chan.recv().block(), Ok(1));
        assert_eq!(chan.try_recv(), Ok(2));
        assert_eq!(chan.try_recv(), Err(TryRecvError::Closed));
        assert_eq!(chan.recv().block(), Err(ClosedError));
    }

    // a sender parked behind a full buffer survives close, and its value is
    // drained through the buffer by later receives
    #[test]
    fn parked_sender_survives_close() {
        let chan = BufferedChannel::new(1);
        assert_eq!(chan.try_send(1), Ok(()));
        let mut parked = chan.send(2);
        chan.close();

        assert_eq!(chan.recv().block(), Ok(1));
        assert_eq!(parked.block(), Ok(()));
        assert_eq!(chan.recv().block(), Ok(2));
        assert_eq!(chan.recv().block(), Err(ClosedError));
    }

    #[test]
    fn close_cancels_parked_receiver() {
        let chan = BufferedChannel::<u32>::new(1);
        let rx = chan.clone();
        let join = thread::spawn(move || rx.recv().block());

        thread::sleep(Duration::from_millis(20));
        chan.close();
        assert_eq!(join.join().unwrap(), Err(ClosedError));
    }

    #[test]
    fn rescinding_parked_send_preserves_backlog_order() {
        let chan = BufferedChannel::new(1);
        assert_eq!(chan.try_send(1), Ok(()));
        let _first = chan.send(2);
        let mut second = chan.send(3);
        let _third = chan.send(4);

        assert_eq!(second.rescind(), Some(3));
        assert_eq!(chan.try_recv(), Ok(1));
        assert_eq!(chan.try_recv(), Ok(2));
        assert_eq!(chan.try_recv(), Ok(4));
    }

    #[tokio::test]
    async fn suspending_send_unparked_by_receive() {
        let chan = BufferedChannel::new(1);
        chan.send(1).await.unwrap();

        let tx = chan.clone();
        let sender = tokio::spawn(async move { tx.send(2).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(chan.recv().await, Ok(1));
        sender.await.unwrap().unwrap();
        assert_eq!(chan.recv().await, Ok(2));
    }

    #[test]
    fn stochastic_exactly_once_through_small_buffer() {
        use rand::{Rng, SeedableRng};

        const PRODUCERS: u32 = 3;
        const PER_PRODUCER: u32 = 300;

        let chan = BufferedChannel::new(4);

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let tx = chan.clone();
                thread::spawn(move || {
                    let mut rng = rand_pcg::Pcg64::seed_from_u64(0x5EED_0BAF + p as u64);
                    for seq in 0..PER_PRODUCER {
                        tx.send((p << 16) | seq).block().unwrap();
                        if rng.gen_ratio(1, 16) {
                            thread::yield_now();
                        }
                    }
                })
            })
            .collect();

        let rx = chan.clone();
        let consumer = thread::spawn(move || {
            let mut got = Vec::new();
            while let Ok(value) = rx.recv().block() {
                got.push(value);
            }
            got
        });

        for producer in producers {
            producer.join().unwrap();
        }
        chan.close();

        let got = consumer.join().unwrap();
        for p in 0..PRODUCERS {
            let seqs: Vec<_> = got
                .iter()
                .filter(|v| *v >> 16 == p)
                .map(|v| *v & 0xFFFF)
                .collect();
            let expected: Vec<_> = (0..PER_PRODUCER).collect();
            assert_eq!(seqs, expected);
        }
    }
}
