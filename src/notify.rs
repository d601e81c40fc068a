/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use rayon::prelude::*;

use crate::key::{Sid, TClass, sid_matches};
use crate::lookup::LookupCore;
use crate::stats::Stats;

/// A policy-change notification. `tclass: None` matches every object class,
/// mirroring a wildcard class registration.
pub type Callback = Box<dyn Fn(Sid, Sid, TClass) + Send + Sync>;

struct CallbackEntry {
	ssid: Sid,
	tsid: Sid,
	tclass: Option<TClass>,
	callback: Callback,
}

/// Tracks the cache's policy seqno and fans a reset out to every registered
/// callback. `reset` walks every bucket with [`rayon`], since buckets are
/// independent and the walk dominates reset latency under a large cache.
pub struct NotificationProtocol {
	latest_seqno: AtomicU32,
	callbacks: RwLock<Vec<Arc<CallbackEntry>>>,
}

impl NotificationProtocol {
	#[must_use]
	pub fn new(initial_seqno: u32) -> Self {
		NotificationProtocol {
			latest_seqno: AtomicU32::new(initial_seqno),
			callbacks: RwLock::new(Vec::new()),
		}
	}

	#[must_use]
	pub fn seqno(&self) -> u32 {
		self.latest_seqno.load(Ordering::Acquire)
	}

	/// Registers a callback fired on every [`reset`](Self::reset) whose
	/// notification matches `(ssid, tsid)` under [`sid_matches`]. `tclass`
	/// of `None` matches any class.
	pub fn add_callback(&self, ssid: Sid, tsid: Sid, tclass: Option<TClass>, callback: Callback) {
		self.callbacks.write().push(Arc::new(CallbackEntry {
			ssid,
			tsid,
			tclass,
			callback,
		}));
	}

	fn snapshot(&self) -> Vec<Arc<CallbackEntry>> {
		self.callbacks.read().clone()
	}

	/// Flushes every bucket in `core`, advances the seqno to `new_seqno`
	/// (never backwards — mirrors `avc_ss_reset`'s `if (seqno > avc_cache.latest_notif)`
	/// guard), then invokes every callback matching
	/// `(notify_ssid, notify_tsid, notify_tclass)`. Returns the number of
	/// entries flushed.
	pub fn reset(
		&self,
		core: &LookupCore,
		new_seqno: u32,
		notify_ssid: Sid,
		notify_tsid: Sid,
		notify_tclass: TClass,
		stats: &Stats,
	) -> usize {
		let total: usize = (0..core.slots())
			.into_par_iter()
			.map(|index| {
				let guard = crate::reclaim::pin();
				core.flush_bucket(index, &guard, stats)
			})
			.sum();

		let mut current = self.latest_seqno.load(Ordering::Acquire);

		while new_seqno > current {
			match self.latest_seqno.compare_exchange_weak(
				current,
				new_seqno,
				Ordering::AcqRel,
				Ordering::Acquire,
			) {
				Ok(_) => break,
				Err(observed) => current = observed,
			}
		}

		for entry in self.snapshot() {
			let class_matches = match entry.tclass {
				Some(tclass) => tclass == notify_tclass,
				None => true,
			};

			if class_matches
				&& sid_matches(entry.ssid, notify_ssid)
				&& sid_matches(entry.tsid, notify_tsid)
			{
				(entry.callback)(notify_ssid, notify_tsid, notify_tclass);
			}
		}

		total
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::decision::Decision;
	use crate::entry::Entry;
	use crate::key::Key;
	use crate::stats::Stats;
	use std::sync::atomic::AtomicUsize;

	#[test]
	fn reset_bumps_seqno_and_flushes_everything() {
		let core = LookupCore::new(512);
		let stats = Stats::new();

		{
			let guard = crate::reclaim::pin();
			for i in 0..10 {
				core.insert(Entry::new(Key::new(i, 0, 0), Decision::new(0, 0, 0, 1, 0), None), &guard, &stats);
			}
		}

		let notify = NotificationProtocol::new(1);
		let removed = notify.reset(&core, 2, crate::key::WILD, crate::key::WILD, 0, &stats);

		assert_eq!(removed, 10);
		assert_eq!(notify.seqno(), 2);
		assert_eq!(core.len(), 0);
	}

	#[test]
	fn callbacks_fire_only_on_matching_identities() {
		let core = LookupCore::new(512);
		let stats = Stats::new();
		let notify = NotificationProtocol::new(1);
		let hits = Arc::new(AtomicUsize::new(0));

		let counted = hits.clone();
		notify.add_callback(5, crate::key::WILD, None, Box::new(move |_, _, _| {
			counted.fetch_add(1, Ordering::Relaxed);
		}));

		notify.reset(&core, 2, 5, 9, 0, &stats);
		notify.reset(&core, 3, 6, 9, 0, &stats);

		assert_eq!(hits.load(Ordering::Relaxed), 1);
	}

	#[test]
	fn class_wildcard_none_matches_any_class() {
		let core = LookupCore::new(512);
		let stats = Stats::new();
		let notify = NotificationProtocol::new(1);
		let hits = Arc::new(AtomicUsize::new(0));

		let counted = hits.clone();
		notify.add_callback(crate::key::WILD, crate::key::WILD, Some(4), Box::new(move |_, _, _| {
			counted.fetch_add(1, Ordering::Relaxed);
		}));

		notify.reset(&core, 2, 1, 1, 4, &stats);
		notify.reset(&core, 3, 1, 1, 5, &stats);

		assert_eq!(hits.load(Ordering::Relaxed), 1);
	}

	#[test]
	fn reset_never_moves_seqno_backwards() {
		let core = LookupCore::new(512);
		let stats = Stats::new();
		let notify = NotificationProtocol::new(5);

		notify.reset(&core, 3, crate::key::WILD, crate::key::WILD, 0, &stats);

		assert_eq!(notify.seqno(), 5);
	}
}
