//! One-shot timer channels.

use crate::channel::BufferedChannel;
use std::{
    thread,
    time::{Duration, Instant},
};

/// A channel that receives exactly one timestamp once `duration` has elapsed
///
/// The timestamp is taken when the timer fires, so it is at or after
/// `duration` from now. Nothing is ever sent afterwards and the channel is
/// left open, so a second receive parks forever; receive once.
///
/// The channel has a one-slot buffer so the timer never waits for a
/// consumer: a select that gives up on its timeout case, or a caller that
/// drops the channel entirely, leaves nothing behind. Panics if `duration`
/// is zero.
pub fn after(duration: Duration) -> BufferedChannel<Instant> {
    assert!(duration > Duration::ZERO, "timer duration must be positive");
    let chan = BufferedChannel::new(1);
    let tx = chan.clone();
    thread::spawn(move || {
        thread::sleep(duration);
        trace!(?duration, "timer fired");
        let _ = tx.try_send(Instant::now());
    });
    chan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::error::TryRecvError;

    #[test]
    fn delivers_one_timestamp_after_the_delay() {
        let start = Instant::now();
        let chan = after(Duration::from_millis(20));
        let fired_at = chan.recv().block().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(fired_at >= start);

        // never a second value
        assert_eq!(chan.try_recv(), Err(TryRecvError::WouldBlock));
    }

    #[test]
    fn timestamp_buffers_without_a_consumer() {
        let chan = after(Duration::from_millis(10));
        thread::sleep(Duration::from_millis(40));
        assert!(chan.try_recv().is_ok());
    }

    #[test]
    #[should_panic(expected = "timer duration must be positive")]
    fn zero_duration_panics() {
        after(Duration::ZERO);
    }
}
