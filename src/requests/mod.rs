/*!
 * Request Slots and Completion Dispatch
 *
 * Bridges call sites to asynchronous native completions. Each issued
 * operation borrows a slot from the pool; the native layer reports back by
 * slot identity, and the dispatcher releases the slot and runs the
 * continuation exactly once.
 */

mod control;
mod dispatcher;
mod pool;
mod slot;

pub use control::{Completion, CompletionToken, ControlBlock, Outputs};
pub use dispatcher::Dispatcher;
pub use pool::{PoolStats, SlotPool};
pub use slot::{Completed, Continuation, Detached, Slot};
