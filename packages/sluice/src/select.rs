//! Waiting on several channels at once, in priority order.
//!
//! A [`Select`] holds an ordered list of receive cases. Executing it scans
//! the cases in registration order and fires the first one with a value
//! ready; if none is, it parks on all of the case channels at once and
//! rescans when any of them signals readiness. Registration order is the
//! only priority: when several channels are ready simultaneously, the case
//! registered first always wins, regardless of which channel became ready
//! first.

use crate::channel::{completion::Completion, wait_queue::WaitToken};
use smallvec::SmallVec;
use std::{
    future::{self, Future},
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering::Relaxed},
        Arc,
    },
    time::Duration,
};

/// One round's readiness signal, shared between a [`Select`] and the
/// channels it is parked on
///
/// Resolves at most once; a channel that becomes possibly-ready completes it,
/// and the select then rescans every case. See [`Selectable`].
pub struct Waiter(pub(crate) Arc<Completion<()>>);

impl Waiter {
    fn new() -> Self {
        Waiter(Completion::new())
    }

    // suspend until some channel signals readiness.
    async fn ready(&self) {
        let _ = future::poll_fn(|cx| self.0.poll_take(cx)).await;
    }
}

/// Names a waiter registration on one channel, for deregistering it
#[derive(Debug, Clone, Copy)]
pub struct WaiterToken(pub(crate) WaitToken);

/// The capability [`Select`] needs from a channel: parking a waiter on it
///
/// `add_waiter` must resolve the waiter immediately if the channel is
/// already ready, so a select that registers late cannot miss it. A waiter
/// is only ever notified; the select rescans its cases to find out which
/// channel (if any) actually has a value, so spurious notifications are
/// harmless.
pub trait Selectable: Send + Sync {
    /// Park a waiter on this channel, to be notified when it may be ready.
    fn add_waiter(&self, waiter: &Waiter) -> WaiterToken;

    /// Remove a previously parked waiter. No-op if it was already consumed.
    fn remove_waiter(&self, token: WaiterToken);
}

/// A channel [`Select`] can receive from
pub trait SelectRecv<T>: Selectable {
    /// Take a value if one is ready right now.
    fn recv_ready(&self) -> Option<T>;
}

type ActionFut = Pin<Box<dyn Future<Output = ()> + Send>>;

// a registered case: the channel to park on, and a closure that attempts a
// non-blocking receive and runs the case's action on success. Some(None)
// means the action ran inline; Some(Some(fut)) hands back an action future
// still to be awaited (outside all channel locks).
struct Case {
    source: Box<dyn Selectable>,
    attempt: Box<dyn FnMut() -> Option<Option<ActionFut>> + Send>,
}

/// Receives from whichever of several channels is ready first
///
/// Cases are tried in the order they were registered, and that order is
/// their priority. One call to [`execute`](Self::execute) fires exactly one
/// case; the `Select` can be executed repeatedly.
#[derive(Default)]
pub struct Select {
    cases: Vec<Case>,
}

impl Select {
    pub fn new() -> Self {
        Select { cases: Vec::new() }
    }

    /// Append a case that receives from `chan` and handles the value with a
    /// synchronous action
    pub fn on_recv<T, C, F>(&mut self, chan: &C, mut action: F) -> &mut Self
    where
        C: SelectRecv<T> + Clone + 'static,
        F: FnMut(T) + Send + 'static,
    {
        let source = chan.clone();
        self.cases.push(Case {
            source: Box::new(chan.clone()),
            attempt: Box::new(move || {
                source.recv_ready().map(|msg| -> Option<ActionFut> {
                    action(msg);
                    None
                })
            }),
        });
        self
    }

    /// Append a case that receives from `chan` and handles the value with a
    /// suspending action
    pub fn on_recv_async<T, C, F, Fut>(&mut self, chan: &C, mut action: F) -> &mut Self
    where
        C: SelectRecv<T> + Clone + 'static,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let source = chan.clone();
        self.cases.push(Case {
            source: Box::new(chan.clone()),
            attempt: Box::new(move || {
                source
                    .recv_ready()
                    .map(|msg| Some(Box::pin(action(msg)) as ActionFut))
            }),
        });
        self
    }

    /// Suspend until one case fires, then run its action
    ///
    /// Panics if no case was registered.
    pub async fn execute(&mut self) {
        assert!(!self.cases.is_empty(), "select with no registered cases");
        run_cases(&mut self.cases).await
    }

    /// Like [`execute`](Self::execute), but give up after `timeout`
    ///
    /// Returns true if the timeout elapsed before any case fired; no user
    /// action runs in that case. The internal timer case is the lowest
    /// priority and is removed again before returning. Panics if no user
    /// case was registered, or if `timeout` is zero.
    pub async fn execute_timeout(&mut self, timeout: Duration) -> bool {
        assert!(!self.cases.is_empty(), "select with no registered cases");
        let timer = crate::timer::after(timeout);
        let timed_out = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&timed_out);
        self.on_recv(&timer, move |_| flag.store(true, Relaxed));

        let mut tail = TailCase(&mut self.cases);
        run_cases(tail.0.as_mut_slice()).await;
        drop(tail);

        timed_out.load(Relaxed)
    }
}

// removes the temporary timer case even if the executing future is dropped
// mid-wait.
struct TailCase<'a>(&'a mut Vec<Case>);

impl Drop for TailCase<'_> {
    fn drop(&mut self) {
        self.0.pop();
    }
}

// scan all cases in order; if none fires, park one fresh waiter on every
// case channel, suspend, deregister everywhere, and rescan from the top. a
// wakeup that turns out to be stale (the channel was drained by someone
// else first) just leads to another round.
async fn run_cases(cases: &mut [Case]) {
    loop {
        let mut fired = None;
        for case in cases.iter_mut() {
            if let Some(outcome) = (case.attempt)() {
                fired = Some(outcome);
                break;
            }
        }
        if let Some(outcome) = fired {
            if let Some(action) = outcome {
                action.await;
            }
            return;
        }

        let waiter = Waiter::new();
        let registered = Registered::new(cases, &waiter);
        waiter.ready().await;
        drop(registered);
        trace!("select rescanning after wakeup");
    }
}

// one round's registrations, deregistered on drop (including when the
// select future is dropped mid-wait).
struct Registered<'a> {
    cases: &'a [Case],
    tokens: SmallVec<[WaiterToken; 4]>,
}

impl<'a> Registered<'a> {
    fn new(cases: &'a [Case], waiter: &Waiter) -> Self {
        let tokens = cases
            .iter()
            .map(|case| case.source.add_waiter(waiter))
            .collect();
        Registered { cases, tokens }
    }
}

impl Drop for Registered<'_> {
    fn drop(&mut self) {
        for (case, token) in self.cases.iter().zip(self.tokens.drain(..)) {
            case.source.remove_waiter(token);
        }
    }
}
