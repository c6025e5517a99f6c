//! Memory orderings used on the occupancy counter.
//!
//! Two happens-before edges make the ring sound:
//!
//! - Push writes a slot, then publishes it with a [`PUBLISH`] increment. Pop
//!   observes the count with an [`OBSERVE`] load before reading the slot.
//! - Pop reads a slot, then releases it with a [`PUBLISH`] decrement. Push
//!   observes the count with an [`OBSERVE`] load before overwriting a slot.
//!
//! Both edges travel through the counter alone; slot storage is accessed with
//! plain reads and writes. The `seq-cst` feature replaces every ordering with
//! [`Ordering::SeqCst`].

use core::sync::atomic::Ordering;

#[cfg(not(feature = "seq-cst"))]
pub(crate) const PUBLISH: Ordering = Ordering::Release;
#[cfg(not(feature = "seq-cst"))]
pub(crate) const OBSERVE: Ordering = Ordering::Acquire;

#[cfg(feature = "seq-cst")]
pub(crate) const PUBLISH: Ordering = Ordering::SeqCst;
#[cfg(feature = "seq-cst")]
pub(crate) const OBSERVE: Ordering = Ordering::SeqCst;
