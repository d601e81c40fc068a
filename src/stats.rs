/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use nohash_hasher::BuildNoHashHasher;

static NEXT_SLOT: AtomicUsize = AtomicUsize::new(0);

thread_local! {
	static SLOT: Cell<usize> = const { Cell::new(usize::MAX) };
}

fn current_slot() -> usize {
	SLOT.with(|cell| {
		let mut slot = cell.get();

		if slot == usize::MAX {
			slot = NEXT_SLOT.fetch_add(1, Ordering::Relaxed);
			cell.set(slot);
		}

		slot
	})
}

#[derive(Default)]
struct Counters {
	lookups: AtomicU64,
	hits: AtomicU64,
	misses: AtomicU64,
	allocations: AtomicU64,
	reclaims: AtomicU64,
	frees: AtomicU64,
}

/// A point-in-time sum of every thread's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StatsSnapshot {
	pub lookups: u64,
	pub hits: u64,
	pub misses: u64,
	pub allocations: u64,
	pub reclaims: u64,
	pub frees: u64,
}

impl StatsSnapshot {
	/// Fraction of lookups that missed, in `[0.0, 1.0]`. `1.0` with no
	/// lookups recorded, matching a cold cache reporting nothing cached yet.
	#[must_use]
	pub fn miss_ratio(&self) -> f64 {
		if self.lookups == 0 {
			return 1.0;
		}

		1.0 - self.hits as f64 / self.lookups as f64
	}
}

/// Per-thread lookup/allocation counters, summed on read so the hot path
/// never contends a shared counter across cores.
pub struct Stats {
	per_thread: DashMap<usize, Counters, BuildNoHashHasher<usize>>,
}

impl Stats {
	#[must_use]
	pub fn new() -> Self {
		Stats {
			per_thread: DashMap::with_hasher(BuildNoHashHasher::default()),
		}
	}

	pub fn record_lookup(&self, hit: bool) {
		let counters = self.per_thread.entry(current_slot()).or_default();

		counters.lookups.fetch_add(1, Ordering::Relaxed);

		if hit {
			counters.hits.fetch_add(1, Ordering::Relaxed);
		} else {
			counters.misses.fetch_add(1, Ordering::Relaxed);
		}
	}

	pub fn record_allocation(&self) {
		self.per_thread
			.entry(current_slot())
			.or_default()
			.allocations
			.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_reclaims(&self, count: usize) {
		self.per_thread
			.entry(current_slot())
			.or_default()
			.reclaims
			.fetch_add(count as u64, Ordering::Relaxed);
	}

	/// Records `count` entries unlinked and scheduled for deferred
	/// destruction — a copy-on-write replace (one entry) or a reset flush
	/// (a whole bucket). Distinct from [`Self::record_reclaims`], which
	/// counts only entries evicted by the soft-bound reclaimer.
	pub fn record_free(&self, count: usize) {
		self.per_thread
			.entry(current_slot())
			.or_default()
			.frees
			.fetch_add(count as u64, Ordering::Relaxed);
	}

	#[must_use]
	pub fn snapshot(&self) -> StatsSnapshot {
		let mut snapshot = StatsSnapshot::default();

		for entry in &self.per_thread {
			let counters = entry.value();

			snapshot.lookups += counters.lookups.load(Ordering::Relaxed);
			snapshot.hits += counters.hits.load(Ordering::Relaxed);
			snapshot.misses += counters.misses.load(Ordering::Relaxed);
			snapshot.allocations += counters.allocations.load(Ordering::Relaxed);
			snapshot.reclaims += counters.reclaims.load(Ordering::Relaxed);
			snapshot.frees += counters.frees.load(Ordering::Relaxed);
		}

		snapshot
	}
}

impl Default for Stats {
	fn default() -> Self {
		Stats::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn it_sums_lookups_and_hits() {
		let stats = Stats::new();

		stats.record_lookup(true);
		stats.record_lookup(false);
		stats.record_lookup(true);

		let snapshot = stats.snapshot();

		assert_eq!(snapshot.lookups, 3);
		assert_eq!(snapshot.hits, 2);
		assert_eq!(snapshot.misses, 1);
		assert!((snapshot.miss_ratio() - 1.0 / 3.0).abs() < 1e-9);
	}

	#[test]
	fn it_sums_across_threads() {
		let stats = std::sync::Arc::new(Stats::new());
		let mut handles = Vec::new();

		for _ in 0..4 {
			let stats = stats.clone();

			handles.push(std::thread::spawn(move || {
				for _ in 0..10 {
					stats.record_lookup(true);
				}
			}));
		}

		for handle in handles {
			handle.join().unwrap();
		}

		assert_eq!(stats.snapshot().lookups, 40);
	}

	#[test]
	fn it_tracks_allocations_reclaims_and_frees() {
		let stats = Stats::new();

		stats.record_allocation();
		stats.record_reclaims(3);
		stats.record_free(1);

		let snapshot = stats.snapshot();

		assert_eq!(snapshot.allocations, 1);
		assert_eq!(snapshot.reclaims, 3);
		assert_eq!(snapshot.frees, 1);
	}

	#[test]
	fn miss_ratio_is_one_with_no_lookups() {
		assert_eq!(StatsSnapshot::default().miss_ratio(), 1.0);
	}
}
