/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Deferred reclamation: the userspace stand-in for the kernel's RCU grace
//! period.
//!
//! A read section is an epoch pin. Any [`Entry`](crate::entry::Entry)
//! reference obtained while pinned remains valid for the lifetime of the
//! pin. Destruction scheduled via [`defer_free`] runs only after every pin
//! that could have observed the pointer has ended. The rest of the crate
//! only ever sees this module's names, never `crossbeam_epoch` directly, so
//! the backing reclamation strategy stays swappable.

pub use crossbeam_epoch::{Atomic, Guard, Owned, Shared};

/// Enters a read section. Cheap and uncontended; must not be held across a
/// call into the (blocking) policy engine.
#[must_use]
pub fn pin() -> Guard {
	crossbeam_epoch::pin()
}

/// Schedules `entry` for destruction once every read section that could
/// have observed it has ended.
///
/// # Safety
///
/// `entry` must have already been unlinked from every [`Bucket`](crate::bucket::Bucket)
/// it was published in, and must not be dereferenced again after this call.
pub unsafe fn defer_free<T: Send + 'static>(shared: Shared<'_, T>, guard: &Guard) {
	guard.defer_destroy(shared);
}
