/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::bucket::{BucketTable, RECLAIM_BATCH};
use crate::entry::Entry;
use crate::key::Key;
use crate::reclaim::Guard;
use crate::stats::Stats;

/// The soft ceiling past which an insert triggers reclamation in the bucket
/// it just grew. Soft because concurrent inserts can transiently overshoot
/// it; nothing blocks on it.
const DEFAULT_THRESHOLD: usize = 512;

/// Owns the hash table and the size accounting needed to decide when to
/// reclaim. Everything here is safe to call from any number of threads
/// concurrently; callers serialize only by holding the relevant bucket lock
/// for the mutating calls.
pub struct LookupCore {
	table: BucketTable,
	threshold: usize,
	size: AtomicUsize,
}

impl LookupCore {
	#[must_use]
	pub fn new(threshold: usize) -> Self {
		LookupCore {
			table: BucketTable::new(),
			threshold: if threshold == 0 { DEFAULT_THRESHOLD } else { threshold },
			size: AtomicUsize::new(0),
		}
	}

	/// Lock-free hot-path lookup. Returns `None` on a miss.
	#[must_use]
	pub fn find<'g>(&self, key: Key, guard: &'g Guard) -> Option<&'g Entry> {
		self.table.bucket(key.slot()).find(key, guard)
	}

	/// Inserts a freshly computed entry, triggering a bounded reclaim pass
	/// on the same bucket if the cache has grown past its threshold. Never
	/// fails: allocation failure in this crate can only come from the
	/// allocator itself, which we let abort per Rust's usual contract.
	pub fn insert(&self, entry: Entry, guard: &Guard, stats: &Stats) {
		let bucket = self.table.bucket(entry.key.slot());

		let _lock = bucket.lock();

		// re-check under the lock: another writer may have inserted the
		// same key while we were computing the decision.
		if bucket.find(entry.key, guard).is_some() {
			return;
		}

		bucket.insert_head(entry, guard);
		let size = self.size.fetch_add(1, Ordering::Relaxed) + 1;
		stats.record_allocation();

		if size > self.threshold {
			let reclaimed = bucket.drain_front(RECLAIM_BATCH, guard);

			if reclaimed > 0 {
				self.size.fetch_sub(reclaimed, Ordering::Relaxed);
				stats.record_reclaims(reclaimed);
			}
		}
	}

	/// Replaces the entry at `key` with `entry`, for the copy-on-write
	/// update path. Returns `false` if `key` was no longer present (raced
	/// with a reclaim or reset).
	pub fn replace(&self, key: Key, entry: Entry, guard: &Guard, stats: &Stats) -> bool {
		let bucket = self.table.bucket(key.slot());
		let _lock = bucket.lock();
		let replaced = bucket.replace(key, entry, guard);

		if replaced {
			stats.record_free(1);
		}

		replaced
	}

	/// Drops every entry in bucket `index`. Returns the number removed.
	pub fn flush_bucket(&self, index: usize, guard: &Guard, stats: &Stats) -> usize {
		let bucket = self.table.bucket(index);
		let _lock = bucket.lock();
		let removed = bucket.drain_all(guard);

		self.size.fetch_sub(removed, Ordering::Relaxed);

		if removed > 0 {
			stats.record_free(removed);
		}

		removed
	}

	/// Drops every entry across every bucket, e.g. for a policy reset.
	/// Returns the number of entries removed.
	pub fn flush(&self, guard: &Guard, stats: &Stats) -> usize {
		let mut total = 0;

		for index in 0..self.table.len() {
			total += self.flush_bucket(index, guard, stats);
		}

		total
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.size.load(Ordering::Relaxed)
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	#[must_use]
	pub fn slots(&self) -> usize {
		self.table.len()
	}

	/// Chain length for bucket `index`, for diagnostics.
	#[must_use]
	pub fn chain_len(&self, index: usize, guard: &Guard) -> usize {
		self.table.bucket(index).chain_len(guard)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::decision::Decision;

	fn entry(ssid: u32) -> Entry {
		Entry::new(Key::new(ssid, 0, 0), Decision::new(0, 0, 0, 1, 0), None)
	}

	#[test]
	fn it_finds_what_it_inserts() {
		let core = LookupCore::new(DEFAULT_THRESHOLD);
		let guard = crate::reclaim::pin();
		let stats = Stats::new();

		core.insert(entry(7), &guard, &stats);

		assert!(core.find(Key::new(7, 0, 0), &guard).is_some());
		assert_eq!(core.len(), 1);
	}

	#[test]
	fn it_does_not_double_insert_the_same_key() {
		let core = LookupCore::new(DEFAULT_THRESHOLD);
		let guard = crate::reclaim::pin();
		let stats = Stats::new();

		core.insert(entry(7), &guard, &stats);
		core.insert(entry(7), &guard, &stats);

		assert_eq!(core.len(), 1);
	}

	#[test]
	fn it_reclaims_a_bucket_past_threshold() {
		let core = LookupCore::new(4);
		let guard = crate::reclaim::pin();
		let stats = Stats::new();

		// all of these land in bucket 0 by construction of Key::slot with
		// tsid = tclass = 0, ssid a multiple of SLOTS.
		for i in 0..8 {
			core.insert(entry(i * crate::bucket::SLOTS as u32), &guard, &stats);
		}

		assert!(core.len() <= 8);
		assert!(stats.snapshot().reclaims > 0);
	}

	#[test]
	fn flush_empties_every_bucket() {
		let core = LookupCore::new(DEFAULT_THRESHOLD);
		let guard = crate::reclaim::pin();
		let stats = Stats::new();

		for i in 0..10 {
			core.insert(entry(i), &guard, &stats);
		}

		let removed = core.flush(&guard, &stats);

		assert_eq!(removed, 10);
		assert_eq!(core.len(), 0);
		assert_eq!(stats.snapshot().frees, 10);
		assert!(core.find(Key::new(0, 0, 0), &guard).is_none());
	}
}
