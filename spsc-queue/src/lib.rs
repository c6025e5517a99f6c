//! A fixed-capacity, lock-free queue for exactly one producer thread and
//! exactly one consumer thread.

mod aligned;
mod ordering;
mod ring;

mod queue;
pub use queue::{BoundedSpscQueue, Consumer, Producer};
