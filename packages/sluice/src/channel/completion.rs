// single-assignment completion cells.
//
// a cell is created pending, resolves exactly once (to a value or to
// cancellation), and is observed by a single consumer. resolution is
// first-wins: once resolved, later complete/cancel calls are no-ops and hand
// their value back. the consumer waits by polling, so the same cell backs
// both the suspending API (polled by an executor) and the thread-blocking
// API (polled through the condvar bridge in the polling module).
//
// resolving a cell only stores the result and wakes the registered waker.
// the waker schedules the consumer; the consumer's continuation never runs
// on the resolver's stack, so a resolver may safely hold a channel lock.

use super::{error::ClosedError, wait_queue::WaitQueue};
use std::{
    mem,
    sync::{Arc, Mutex},
    task::{Context, Poll, Waker},
};

pub(crate) struct Completion<T> {
    state: Mutex<State<T>>,
}

enum State<T> {
    Pending(Option<Waker>),
    Done(T),
    Cancelled,
    Taken,
}

impl<T> Completion<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Completion {
            state: Mutex::new(State::Pending(None)),
        })
    }

    /// Resolve the cell to a value, waking the consumer.
    ///
    /// First-wins: if the cell is already resolved, the value is handed back.
    pub(crate) fn complete(&self, value: T) -> Result<(), T> {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            State::Pending(waker) => {
                let waker = waker.take();
                *state = State::Done(value);
                drop(state);
                if let Some(waker) = waker {
                    waker.wake();
                }
                Ok(())
            }
            _ => Err(value),
        }
    }

    /// Resolve the cell to the cancelled state, waking the consumer.
    ///
    /// No-op if the cell is already resolved.
    pub(crate) fn cancel(&self) {
        let mut state = self.state.lock().unwrap();
        if let State::Pending(waker) = &mut *state {
            let waker = waker.take();
            *state = State::Cancelled;
            drop(state);
            if let Some(waker) = waker {
                waker.wake();
            }
        }
    }

    /// Poll for the result, registering the context's waker while pending.
    ///
    /// Panics if the value was already taken.
    pub(crate) fn poll_take(&self, cx: &mut Context<'_>) -> Poll<Result<T, ClosedError>> {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            State::Pending(waker) => {
                *waker = Some(cx.waker().clone());
                Poll::Pending
            }
            State::Done(_) => {
                let State::Done(value) = mem::replace(&mut *state, State::Taken) else {
                    unreachable!();
                };
                Poll::Ready(Ok(value))
            }
            State::Cancelled => Poll::Ready(Err(ClosedError)),
            State::Taken => panic!("completion cell polled after its value was taken"),
        }
    }

    /// Take the result if the cell has resolved, without registering a waker.
    ///
    /// Panics if the value was already taken.
    pub(crate) fn take_now(&self) -> Option<Result<T, ClosedError>> {
        let mut state = self.state.lock().unwrap();
        match &*state {
            State::Pending(_) => None,
            State::Done(_) => {
                let State::Done(value) = mem::replace(&mut *state, State::Taken) else {
                    unreachable!();
                };
                Some(Ok(value))
            }
            State::Cancelled => Some(Err(ClosedError)),
            State::Taken => panic!("completion cell drained after its value was taken"),
        }
    }
}

/// A queued sender: the message waiting to be taken plus the completion
/// signal its `SendFut` is parked on.
pub(crate) struct SenderEntry<T> {
    pub(crate) msg: T,
    pub(crate) done: Arc<Completion<()>>,
}

/// Wake one parked select waiter, if any is still live.
///
/// Waiters that already fired (a select can be notified by one channel and
/// then resolve against another) are drained rather than counted, so a
/// notification is never absorbed by a dead waiter while a live one sleeps.
pub(crate) fn notify_one(waiters: &mut WaitQueue<Arc<Completion<()>>>) {
    while let Some(waiter) = waiters.dequeue() {
        if waiter.complete(()).is_ok() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::polling::{self, Timeout};
    use std::{future, thread, time::Duration};

    #[test]
    fn complete_then_take() {
        let cell = Completion::new();
        assert!(cell.take_now().is_none());
        assert_eq!(cell.complete(7), Ok(()));
        assert_eq!(cell.take_now(), Some(Ok(7)));
    }

    #[test]
    fn first_completion_wins() {
        let cell = Completion::new();
        assert_eq!(cell.complete(1), Ok(()));
        assert_eq!(cell.complete(2), Err(2));
        cell.cancel();
        assert_eq!(cell.take_now(), Some(Ok(1)));
    }

    #[test]
    fn cancel_sticks() {
        let cell = Completion::<u32>::new();
        cell.cancel();
        assert_eq!(cell.complete(1), Err(1));
        assert_eq!(cell.take_now(), Some(Err(ClosedError)));
    }

    #[test]
    fn blocked_consumer_woken_by_completion() {
        let cell = Completion::new();
        let completer = Arc::clone(&cell);
        let join = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            completer.complete("hello").unwrap();
        });
        let mut fut = future::poll_fn(|cx| cell.poll_take(cx));
        let got = polling::poll(&mut fut, Timeout::Never).unwrap();
        assert_eq!(got, Ok("hello"));
        join.join().unwrap();
    }

    #[test]
    fn blocked_consumer_woken_by_cancellation() {
        let cell = Completion::<u32>::new();
        let canceller = Arc::clone(&cell);
        let join = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });
        let mut fut = future::poll_fn(|cx| cell.poll_take(cx));
        let got = polling::poll(&mut fut, Timeout::Never).unwrap();
        assert_eq!(got, Err(ClosedError));
        join.join().unwrap();
    }

    #[test]
    fn notify_one_skips_fired_waiters() {
        let mut waiters = WaitQueue::new();
        let stale = Completion::new();
        stale.complete(()).unwrap();
        let live = Completion::new();
        waiters.enqueue(Arc::clone(&stale));
        waiters.enqueue(Arc::clone(&live));

        notify_one(&mut waiters);
        assert_eq!(live.take_now(), Some(Ok(())));
        assert!(waiters.is_empty());
    }
}
