/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use crate::error::CacheError;
use crate::extended::ExtendedDecision;
use crate::key::Key;
use crate::lookup::LookupCore;
use crate::reclaim::Guard;
use crate::stats::Stats;

/// A policy-engine-driven mutation of an already-cached decision.
///
/// `Revoke` covers both the kernel's `TRY_REVOKE` and `REVOKE` callbacks:
/// both only ever clear granted permission bits on a live entry, so there is
/// no behavioral difference left to preserve between them here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
	Grant(u32),
	Revoke(u32),
	AuditallowEnable(u32),
	AuditallowDisable(u32),
	AuditdenyEnable(u32),
	AuditdenyDisable(u32),
}

/// Applies copy-on-write mutations to entries already present in a
/// [`LookupCore`]. Every call builds a successor via [`Entry::cow`](crate::entry::Entry::cow),
/// mutates the copy, then splices it in atomically — readers never observe
/// a partially mutated decision.
pub struct UpdateCore;

impl UpdateCore {
	/// Applies `event` to the entry at `key`, provided the entry is still
	/// linked under the same `seqno` the caller observed it at. Fails with
	/// [`CacheError::NotFound`] if the entry is gone or its seqno has moved
	/// on — raced with a reclaim or a policy reset — in which case the
	/// caller's update has lost the race and is dropped rather than applied
	/// to stale state, mirroring `avc_update_node`'s `seqno == pos->ae.avd.seqno`
	/// match.
	pub fn apply(
		core: &LookupCore,
		key: Key,
		event: Event,
		seqno: u32,
		guard: &Guard,
		stats: &Stats,
	) -> Result<(), CacheError> {
		let current = core.find(key, guard).ok_or(CacheError::NotFound)?;

		if current.decision.seqno != seqno {
			return Err(CacheError::NotFound);
		}

		let mut next = current.cow();

		match event {
			Event::Grant(perms) => next.decision.allowed |= perms,
			Event::Revoke(perms) => next.decision.allowed &= !perms,
			Event::AuditallowEnable(perms) => next.decision.auditallow |= perms,
			Event::AuditallowDisable(perms) => next.decision.auditallow &= !perms,
			Event::AuditdenyEnable(perms) => next.decision.auditdeny |= perms,
			Event::AuditdenyDisable(perms) => next.decision.auditdeny &= !perms,
		}

		if core.replace(key, next, guard, stats) {
			Ok(())
		} else {
			Err(CacheError::NotFound)
		}
	}

	/// Records `decision` against the entry at `key`, replacing any
	/// existing entry for the same `op_type`. Used when a command-specific
	/// permission check misses the extended list and the policy engine
	/// computes one on demand.
	pub fn add_extended(
		core: &LookupCore,
		key: Key,
		decision: ExtendedDecision,
		guard: &Guard,
		stats: &Stats,
	) -> Result<(), CacheError> {
		let current = core.find(key, guard).ok_or(CacheError::NotFound)?;
		let mut next = current.cow();

		let mut list = next.extended.take().unwrap_or_default();
		list.add(decision);
		next.extended = Some(list);

		if core.replace(key, next, guard, stats) {
			Ok(())
		} else {
			Err(CacheError::NotFound)
		}
	}
}
