// thread-blocking bridge for channel futures.
//
// design based on the pollster crate: poll the future on the calling thread,
// with a waker that signals a mutex + condvar pair instead of an executor.
// the suspending and blocking call variants of every operation go through the
// same future; this module only changes how "wait" is realized.

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Condvar, Mutex},
    task::{Context, Poll, Wake, Waker},
    time::Instant,
};

// timeout for blocking on a future.
#[derive(Clone, Copy)]
pub(crate) enum Timeout {
    // never time out.
    Never,
    // time out at the given deadline.
    At(Instant),
    // time out if the future cannot be resolved without blocking.
    NonBlocking,
}

// poll the future until it resolves, or return err once the timeout is
// reached. the future is left pending on err; the caller decides whether to
// abandon the underlying operation.
pub(crate) fn poll<F>(fut: &mut F, timeout: Timeout) -> Result<F::Output, ()>
where
    F: Future + Unpin,
{
    let signal = Arc::new(Signal {
        state: Mutex::new(State::Empty),
        cond: Condvar::new(),
    });
    let waker = Waker::from(Arc::clone(&signal));
    let mut cx = Context::from_waker(&waker);

    loop {
        // return if ready
        if let Poll::Ready(output) = Pin::new(&mut *fut).poll(&mut cx) {
            return Ok(output);
        }

        // otherwise, block until notification or timeout
        let mut lock = signal.state.lock().unwrap();

        // if a notification is already present, skip to the next loop
        // iteration so as to release the lock and poll again without blocking
        if let State::Notified = *lock {
            *lock = State::Empty;
            continue;
        }

        debug_assert!(matches!(*lock, State::Empty));
        *lock = State::Waiting;
        match timeout {
            // block on mutex + condvar indefinitely
            Timeout::Never => {
                while let State::Waiting = *lock {
                    lock = signal.cond.wait(lock).unwrap();
                }
            }

            // block on mutex + condvar until the deadline, then return err
            Timeout::At(deadline) => {
                while let State::Waiting = *lock {
                    let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                        return Err(());
                    };
                    let (relocked, wait) = signal.cond.wait_timeout(lock, remaining).unwrap();
                    lock = relocked;
                    if wait.timed_out() && matches!(*lock, State::Waiting) {
                        return Err(());
                    }
                }
            }

            // don't block on mutex + condvar, return err instead
            Timeout::NonBlocking => return Err(()),
        }
        *lock = State::Empty;
    }
}

// synchronization signal state
enum State {
    Empty,
    Waiting,
    Notified,
}

// synchronization signal
struct Signal {
    state: Mutex<State>,
    cond: Condvar,
}

impl Wake for Signal {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let mut lock = self.state.lock().unwrap();
        match *lock {
            State::Notified => {}
            State::Empty => *lock = State::Notified,
            State::Waiting => {
                *lock = State::Empty;
                self.cond.notify_one();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{future, time::Duration};

    #[test]
    fn ready_future_resolves() {
        let mut fut = future::ready(42);
        assert_eq!(poll(&mut fut, Timeout::Never), Ok(42));
    }

    #[test]
    fn non_blocking_on_pending_future() {
        let mut fut = future::pending::<()>();
        assert_eq!(poll(&mut fut, Timeout::NonBlocking), Err(()));
    }

    #[test]
    fn deadline_elapses_on_pending_future() {
        let mut fut = future::pending::<()>();
        let start = Instant::now();
        let deadline = start + Duration::from_millis(20);
        assert_eq!(poll(&mut fut, Timeout::At(deadline)), Err(()));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn already_elapsed_deadline_still_polls_once() {
        let mut fut = future::ready('x');
        let deadline = Instant::now() - Duration::from_millis(5);
        assert_eq!(poll(&mut fut, Timeout::At(deadline)), Ok('x'));
    }
}
