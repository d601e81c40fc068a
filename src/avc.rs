/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::audit::{AuditRecord, AuditSink};
use crate::config::Config;
use crate::decision::Decision;
use crate::entry::Entry;
use crate::error::CacheError;
use crate::extended::ExtendedDecision;
use crate::key::{Key, Sid, TClass};
use crate::lookup::LookupCore;
use crate::notify::{Callback, NotificationProtocol};
use crate::policy_engine::PolicyEngine;
use crate::reclaim::{self, Guard};
use crate::stats::StatsSnapshot;
use crate::update::{Event, UpdateCore};

/// Bucket occupancy, for diagnostics and the `avc-diag` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HashStats {
	pub slots: usize,
	pub entries: usize,
	pub longest_chain: usize,
}

/// A concurrent access vector cache in front of a [`PolicyEngine`], with
/// decisions recorded through an [`AuditSink`].
///
/// Reads never block on a mutex: [`Self::has_perm`] and friends only pin an
/// epoch and walk a bucket chain, falling back to the (blocking) policy
/// engine solely on a miss or a stale-seqno hit.
pub struct Avc<P, A> {
	lookup: LookupCore,
	notify: NotificationProtocol,
	stats: crate::stats::Stats,
	policy: P,
	audit: A,
	disabled: AtomicBool,
	start_time: u64,
}

impl<P: PolicyEngine, A: AuditSink> Avc<P, A> {
	#[must_use]
	pub fn new(policy: P, audit: A, config: Config) -> Self {
		let seqno = policy.seqno();

		Avc {
			lookup: LookupCore::new(config.threshold),
			notify: NotificationProtocol::new(seqno),
			stats: crate::stats::Stats::new(),
			policy,
			audit,
			disabled: AtomicBool::new(false),
			start_time: kwik::time::timestamp(),
		}
	}

	/// Seconds elapsed since this cache was constructed.
	#[must_use]
	pub fn uptime(&self) -> u64 {
		kwik::time::timestamp() - self.start_time
	}

	fn ensure_enabled(&self) -> Result<(), CacheError> {
		if self.disabled.load(Ordering::Acquire) {
			Err(CacheError::Disabled)
		} else {
			Ok(())
		}
	}

	/// Looks up or computes the access vector for `key`, inserting or
	/// replacing the cached entry as needed. A cached entry whose seqno no
	/// longer matches the cache's latest seqno is treated as a miss: the
	/// freshly computed decision is authoritative for this call even
	/// though, by the time it is inserted, a concurrent reset may already
	/// have moved the seqno on again.
	fn decision_for(&self, key: Key, guard: &Guard) -> Decision {
		let current_seqno = self.notify.seqno();

		if let Some(entry) = self.lookup.find(key, guard) {
			if entry.decision.seqno == current_seqno {
				self.stats.record_lookup(true);
				return entry.decision;
			}
		}

		self.stats.record_lookup(false);

		let mut decision = self.policy.compute_av(key.ssid, key.tsid, key.tclass);
		decision.seqno = current_seqno;

		// a reset may have bumped the seqno while the policy engine was
		// being consulted; linking this entry now would cache a decision
		// already older than `latest_seqno`, so skip the cache and hand the
		// caller the freshly computed decision uncached instead.
		if self.notify.seqno() == current_seqno {
			let fresh = Entry::new(key, decision, None);

			if !self.lookup.replace(key, fresh.clone(), guard, &self.stats) {
				self.lookup.insert(fresh, guard, &self.stats);
			}
		}

		decision
	}

	/// As [`Self::decision_for`] but for a single command within `op_type`.
	/// On a hit, only the word containing `number` is copied out — mirrors
	/// `avc_quick_copy_operation_decision`, which fills in the caller's
	/// `av_decision` one word at a time rather than cloning the whole
	/// per-operation bitset.
	fn extended_for(&self, key: Key, op_type: u8, number: u8, guard: &Guard) -> ExtendedDecision {
		if let Some(entry) = self.lookup.find(key, guard) {
			if let Some(list) = &entry.extended {
				if list.is_known(op_type) {
					if let Some(decision) = list.find(op_type) {
						return decision.quick_copy(number);
					}
				}
			}
		}

		let computed = self
			.policy
			.compute_extended(key.ssid, key.tsid, key.tclass, op_type);

		// best-effort: if the base entry raced out from under us (reclaim,
		// reset) the freshly computed decision above is still returned to
		// the caller, it simply isn't cached.
		let _ = UpdateCore::add_extended(&self.lookup, key, computed.clone(), guard, &self.stats);

		computed
	}

	/// On a permissive denial, widens the cached `allowed` mask so a
	/// subsequent identical check short-circuits without auditing again.
	/// Mirrors `avc_denied`, which issues `avc_update_node(AVC_CALLBACK_GRANT, ...)`
	/// whenever `avd->flags & AVC_DECISION_PERMISSIVE` on a denial. Best-effort:
	/// if the entry raced out from under us the denial was already resolved
	/// permissively for this call regardless of whether the widening lands.
	fn resolve_denial(&self, key: Key, decision: &Decision, requested: u32, guard: &Guard) {
		if decision.is_permissive() {
			let _ = UpdateCore::apply(
				&self.lookup,
				key,
				Event::Grant(requested),
				decision.seqno,
				guard,
				&self.stats,
			);
		}
	}

	fn must_audit(decision: &Decision, requested: u32, denied: u32) -> bool {
		if denied != 0 {
			decision.auditdeny.intersects(requested)
		} else {
			decision.auditallow.intersects(requested)
		}
	}

	/// Resolves `ssid`/`tsid` into audit-facing context strings. Only
	/// called once a record has already been determined to need auditing,
	/// since resolution may block.
	fn build_audit_record(
		&self,
		ssid: Sid,
		tsid: Sid,
		tclass: TClass,
		requested: u32,
		denied: u32,
	) -> Result<AuditRecord, CacheError> {
		Ok(AuditRecord {
			ssid,
			tsid,
			tclass,
			requested,
			denied,
			ssid_context: self.policy.sid_to_context(ssid)?,
			tsid_context: self.policy.sid_to_context(tsid)?,
		})
	}

	/// Checks `requested` permissions for `(ssid, tsid, tclass)`, auditing
	/// the outcome. A permissive decision audits a denial but still
	/// returns `Ok`.
	pub fn has_perm(
		&self,
		ssid: Sid,
		tsid: Sid,
		tclass: TClass,
		requested: u32,
		may_block: bool,
	) -> Result<(), CacheError> {
		self.ensure_enabled()?;

		let key = Key::new(ssid, tsid, tclass);
		let guard = reclaim::pin();
		let decision = self.decision_for(key, &guard);
		let denied = decision.denied(requested);

		if Self::must_audit(&decision, requested, denied) {
			let record = self.build_audit_record(ssid, tsid, tclass, requested, denied)?;
			self.audit.audit(&record, may_block)?;
		}

		if denied != 0 {
			self.resolve_denial(key, &decision, requested, &guard);

			if !decision.is_permissive() {
				return Err(CacheError::AccessDenied);
			}
		}

		Ok(())
	}

	/// As [`Self::has_perm`], but never calls into the audit sink. Returns
	/// the resolved [`Decision`] itself, mirroring the `struct av_decision`
	/// out-parameter the original kernel call fills in, rather than
	/// discarding it once the grant/deny check is made.
	pub fn has_perm_noaudit(
		&self,
		ssid: Sid,
		tsid: Sid,
		tclass: TClass,
		requested: u32,
	) -> Result<Decision, CacheError> {
		self.ensure_enabled()?;

		let key = Key::new(ssid, tsid, tclass);
		let guard = reclaim::pin();
		let decision = self.decision_for(key, &guard);
		let denied = decision.denied(requested);

		if denied != 0 {
			self.resolve_denial(key, &decision, requested, &guard);

			if !decision.is_permissive() {
				return Err(CacheError::AccessDenied);
			}
		}

		Ok(decision)
	}

	/// Checks a single command (`number`) within extended operation
	/// `op_type`, falling back to [`Self::has_perm`]'s coarse-grained
	/// decision when nothing in `requested` maps to an extended
	/// permission.
	pub fn has_extended_perm(
		&self,
		ssid: Sid,
		tsid: Sid,
		tclass: TClass,
		op_type: u8,
		number: u8,
		requested: u32,
		may_block: bool,
	) -> Result<(), CacheError> {
		self.ensure_enabled()?;

		let key = Key::new(ssid, tsid, tclass);
		let guard = reclaim::pin();
		let decision = self.decision_for(key, &guard);
		let extended = self.extended_for(key, op_type, number, &guard);

		let denied = if extended.allows(number) { 0 } else { requested };
		let mut must_audit = Self::must_audit(&decision, requested, denied);

		if denied != 0 && extended.must_not_audit_deny(number) {
			must_audit = false;
		} else if denied == 0 && extended.must_audit_allow(number) {
			must_audit = true;
		}

		if must_audit {
			let record = self.build_audit_record(ssid, tsid, tclass, requested, denied)?;
			self.audit.audit(&record, may_block)?;
		}

		if denied != 0 {
			self.resolve_denial(key, &decision, requested, &guard);

			if !decision.is_permissive() {
				return Err(CacheError::AccessDenied);
			}
		}

		Ok(())
	}

	/// Applies a policy-engine-driven mutation to an already-cached entry.
	/// `seqno` must match the cached entry's seqno or the update is dropped
	/// as [`CacheError::NotFound`] rather than applied to stale state.
	pub fn update(
		&self,
		ssid: Sid,
		tsid: Sid,
		tclass: TClass,
		event: Event,
		seqno: u32,
	) -> Result<(), CacheError> {
		self.ensure_enabled()?;

		let guard = reclaim::pin();
		UpdateCore::apply(&self.lookup, Key::new(ssid, tsid, tclass), event, seqno, &guard, &self.stats)
	}

	/// The cache's current policy generation number.
	#[must_use]
	pub fn policy_seqno(&self) -> u32 {
		self.notify.seqno()
	}

	/// Flushes the entire cache and bumps the seqno, notifying every
	/// registered callback matching `(notify_ssid, notify_tsid, notify_tclass)`.
	/// Returns the number of entries flushed.
	pub fn ss_reset(
		&self,
		new_seqno: u32,
		notify_ssid: Sid,
		notify_tsid: Sid,
		notify_tclass: TClass,
	) -> usize {
		let flushed = self
			.notify
			.reset(&self.lookup, new_seqno, notify_ssid, notify_tsid, notify_tclass, &self.stats);

		info!("avc: policy reset, seqno={new_seqno}, flushed={flushed}");
		flushed
	}

	/// Registers a reset callback. Always succeeds — kept fallible to mirror
	/// the kernel's `avc_add_callback`, whose only failure mode is an
	/// allocation the registry here doesn't need.
	pub fn add_callback(
		&self,
		ssid: Sid,
		tsid: Sid,
		tclass: Option<TClass>,
		callback: Callback,
	) -> Result<(), CacheError> {
		self.notify.add_callback(ssid, tsid, tclass, callback);
		Ok(())
	}

	/// Disables the cache. Every call after this returns
	/// [`CacheError::Disabled`] immediately.
	pub fn disable(&self) {
		self.disabled.store(true, Ordering::Release);
	}

	#[must_use]
	pub fn stats(&self) -> StatsSnapshot {
		self.stats.snapshot()
	}

	#[must_use]
	pub fn get_hash_stats(&self) -> HashStats {
		let guard = reclaim::pin();
		let mut longest_chain = 0;

		for index in 0..self.lookup.slots() {
			longest_chain = longest_chain.max(self.lookup.chain_len(index, &guard));
		}

		HashStats {
			slots: self.lookup.slots(),
			entries: self.lookup.len(),
			longest_chain,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::audit::NullAuditSink;
	use crate::policy_engine::test_double::StaticPolicyEngine;

	fn avc() -> Avc<StaticPolicyEngine, NullAuditSink> {
		Avc::new(StaticPolicyEngine::new(), NullAuditSink, Config::default())
	}

	#[test]
	fn cold_lookup_then_warm_hit() {
		let avc = avc();

		assert!(avc.has_perm(1, 2, 0, 0b1, false).is_ok());
		assert!(avc.has_perm(1, 2, 0, 0b1, false).is_ok());

		let stats = avc.stats();
		assert_eq!(stats.lookups, 2);
		assert_eq!(stats.hits, 1);
		assert_eq!(stats.misses, 1);
	}

	#[test]
	fn denies_under_the_static_policys_odd_tsid_rule() {
		let avc = avc();
		let result = avc.has_perm(1, 3, 0, 0b1, false);
		assert_eq!(result, Err(CacheError::AccessDenied));
	}

	#[test]
	fn reset_forces_recomputation() {
		let avc = avc();

		avc.has_perm(1, 2, 0, 0b1, false).unwrap();
		assert_eq!(avc.stats().misses, 1);

		avc.ss_reset(avc.policy_seqno() + 1, crate::key::WILD, crate::key::WILD, 0);

		avc.has_perm(1, 2, 0, 0b1, false).unwrap();
		assert_eq!(avc.stats().misses, 2);
	}

	#[test]
	fn disable_fails_every_subsequent_call() {
		let avc = avc();
		avc.disable();

		assert_eq!(avc.has_perm(1, 2, 0, 0b1, false), Err(CacheError::Disabled));
		assert_eq!(avc.has_perm_noaudit(1, 2, 0, 0b1), Err(CacheError::Disabled));
	}

	#[test]
	fn update_narrows_a_cached_grant() {
		let avc = avc();
		avc.has_perm(1, 2, 0, 0xFF, false).unwrap();

		avc.update(1, 2, 0, Event::Revoke(0xFF), avc.policy_seqno()).unwrap();

		assert_eq!(avc.has_perm(1, 2, 0, 0xFF, false), Err(CacheError::AccessDenied));
	}

	#[test]
	fn update_with_a_stale_seqno_is_dropped() {
		let avc = avc();
		avc.has_perm(1, 2, 0, 0xFF, false).unwrap();

		let stale_seqno = avc.policy_seqno() + 1;
		let result = avc.update(1, 2, 0, Event::Revoke(0xFF), stale_seqno);

		assert_eq!(result, Err(CacheError::NotFound));
		assert!(avc.has_perm(1, 2, 0, 0xFF, false).is_ok());
	}

	#[test]
	fn extended_permission_misses_then_hits() {
		let avc = avc();
		assert!(avc.has_extended_perm(1, 2, 0, 5, 9, 0b1, false).is_err());
		assert!(avc.has_extended_perm(1, 2, 0, 5, 9, 0b1, false).is_err());
	}
}
