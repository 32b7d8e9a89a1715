// implementation of the channels.
//
// the basic architecture is as such:
//
// channel handles wrap around Arc<Mutex<shared state>>
//                                         |
//          /------------------------------/
//          v
//       shared state (core::State)
//          |
//          |------ for the buffered flavor, it contains a util::RingQueue<T>
//          |       holding the buffered values
//          |
//          |------ it contains a "sender wait queue":
//          |
//          |       a FIFO of nodes, each a value waiting to be taken plus
//          |       the completion cell its send future is parked on. queue
//          |       order is what makes matching fair.
//          |
//          |------ it contains a "receiver wait queue", which is the same
//          |       idea for recv futures (the node is just the cell), and a
//          |       "select waiter queue" of readiness signals for parked
//          |       selects.
//
// an operation that cannot complete immediately enqueues a node under the
// channel lock, then waits on the node's completion cell with the lock
// released. the counterpart that completes the operation also runs under the
// lock, so a node in a queue always implies a pending cell. blocking
// versions of operations are built as a layer on top of the futures in the
// polling module.
//
// the organization of these modules is as such:
//
//      These are used like
//      library utilities:
//    /--------------------\
//
//      wait_queue<------------core: the shared state, its lock, and the
//                   |         ^     operations every flavor needs (close,
//      completion<--/         |     unlinking abandoned nodes).
//                             |
//                             |---rendezvous: Channel<T>, the unbuffered
//                             |               flavor.
//                             \---buffered:   BufferedChannel<T>.
//                                   both implement the select capability
//                                   and hand out the future types.
//
//      polling<---------------future: SendFut and RecvFut, re-exported
//                                     publically.
//
// there is also the error module, which contains the relevant error types,
// which is also re-exported publically.

pub(crate) mod completion;
pub(crate) mod error;
pub(crate) mod future;
pub(crate) mod wait_queue;

mod buffered;
mod core;
mod polling;
mod rendezvous;

pub use buffered::BufferedChannel;
pub use rendezvous::Channel;
