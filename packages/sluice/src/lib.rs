//! CSP-style channels for threads and tasks, with a priority select.
//!
//! Two channel flavors carry values between concurrent callers: [`Channel`]
//! is a rendezvous (a send completes only when paired with a receive) and
//! [`BufferedChannel`] holds up to a fixed number of values between the two
//! sides. Every operation comes in a non-blocking `try_` form, a
//! thread-blocking form, and a suspending form, all backed by the same
//! registration. [`Select`] waits on the receive side of several channels at
//! once and fires the first one ready, in registration order, optionally
//! with a timeout built from [`timer::after`].

#[macro_use]
extern crate tracing;

mod channel;

pub mod select;
pub mod timer;
pub mod util;

pub use crate::channel::{BufferedChannel, Channel};
pub use crate::select::{Select, SelectRecv, Selectable};

/// Error types
pub mod error {
    pub use crate::channel::error::*;
}

/// Future types
pub mod future {
    pub use crate::channel::future::{RecvFut, SendFut};
}
