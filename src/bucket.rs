/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::sync::atomic::Ordering;

use parking_lot::{Mutex, MutexGuard};

use crate::entry::Entry;
use crate::key::Key;
use crate::reclaim::{Atomic, Guard, Owned, Shared};

/// Number of hash-table chains. Must be a power of two.
pub const SLOTS: usize = 512;

/// Maximum entries unlinked from a single bucket per eviction pass.
pub const RECLAIM_BATCH: usize = 16;

struct Node {
	entry: Entry,
	next: Atomic<Node>,
}

/// One hash-table chain: an intrusive singly-linked list readable without
/// locks under a pinned [`Guard`], mutated only by whoever holds `lock`.
pub struct Bucket {
	head: Atomic<Node>,
	lock: Mutex<()>,
}

impl Bucket {
	fn new() -> Self {
		Bucket {
			head: Atomic::null(),
			lock: Mutex::new(()),
		}
	}

	/// Blocks until the writer lock is acquired. Readers never call this.
	#[must_use]
	pub fn lock(&self) -> MutexGuard<'_, ()> {
		self.lock.lock()
	}

	/// Non-blocking lock attempt, used by the eviction hint scan so
	/// contended buckets are simply skipped rather than waited on.
	#[must_use]
	pub fn try_lock(&self) -> Option<MutexGuard<'_, ()>> {
		self.lock.try_lock()
	}

	/// Lock-free traversal. The caller must hold a pinned `guard`; the
	/// returned reference is valid only for its lifetime.
	#[must_use]
	pub fn find<'g>(&self, key: Key, guard: &'g Guard) -> Option<&'g Entry> {
		let mut cur = self.head.load(Ordering::Acquire, guard);

		while let Some(node) = unsafe { cur.as_ref() } {
			if node.entry.key == key {
				return Some(&node.entry);
			}

			cur = node.next.load(Ordering::Acquire, guard);
		}

		None
	}

	/// Publishes `entry` at the head of the chain. Caller must hold `lock`.
	pub fn insert_head(&self, entry: Entry, guard: &Guard) {
		let old_head = self.head.load(Ordering::Relaxed, guard);

		let new = Owned::new(Node {
			entry,
			next: Atomic::null(),
		});

		new.next.store(old_head, Ordering::Relaxed);
		self.head.store(new.into_shared(guard), Ordering::Release);
	}

	/// Splices a freshly built entry in place of the entry with matching
	/// `key`, scheduling the displaced node for deferred free. Returns
	/// `false` if no entry with `key` was found. Caller must hold `lock`.
	pub fn replace(&self, key: Key, entry: Entry, guard: &Guard) -> bool {
		let mut link = &self.head;
		let mut cur = link.load(Ordering::Acquire, guard);

		while let Some(node) = unsafe { cur.as_ref() } {
			if node.entry.key == key {
				let next = node.next.load(Ordering::Relaxed, guard);

				let new = Owned::new(Node {
					entry,
					next: Atomic::null(),
				});

				new.next.store(next, Ordering::Relaxed);
				link.store(new.into_shared(guard), Ordering::Release);

				unsafe {
					guard.defer_destroy(cur);
				}

				return true;
			}

			link = &node.next;
			cur = link.load(Ordering::Acquire, guard);
		}

		false
	}

	/// Removes the entry with matching `key`, scheduling it for deferred
	/// free. Returns `false` if no such entry exists. Caller must hold `lock`.
	pub fn unlink(&self, key: Key, guard: &Guard) -> bool {
		let mut link = &self.head;
		let mut cur = link.load(Ordering::Acquire, guard);

		while let Some(node) = unsafe { cur.as_ref() } {
			if node.entry.key == key {
				let next = node.next.load(Ordering::Acquire, guard);
				link.store(next, Ordering::Release);

				unsafe {
					guard.defer_destroy(cur);
				}

				return true;
			}

			link = &node.next;
			cur = link.load(Ordering::Acquire, guard);
		}

		false
	}

	/// Unlinks up to `max` entries from the front of the chain, in list
	/// order, scheduling each for deferred free. Returns the number removed.
	/// Caller must hold `lock`.
	pub fn drain_front(&self, max: usize, guard: &Guard) -> usize {
		let mut removed: Vec<Shared<Node>> = Vec::with_capacity(max);
		let mut cur = self.head.load(Ordering::Acquire, guard);

		while removed.len() < max {
			match unsafe { cur.as_ref() } {
				Some(node) => {
					removed.push(cur);
					cur = node.next.load(Ordering::Acquire, guard);
				},

				None => break,
			}
		}

		if removed.is_empty() {
			return 0;
		}

		self.head.store(cur, Ordering::Release);

		for shared in &removed {
			unsafe {
				guard.defer_destroy(*shared);
			}
		}

		removed.len()
	}

	/// Unlinks every entry in the chain, scheduling each for deferred free.
	/// Returns the number removed. Caller must hold `lock`.
	pub fn drain_all(&self, guard: &Guard) -> usize {
		let old_head = self.head.swap(Shared::null(), Ordering::AcqRel, guard);
		let mut cur = old_head;
		let mut count = 0;

		while let Some(node) = unsafe { cur.as_ref() } {
			let next = node.next.load(Ordering::Acquire, guard);

			unsafe {
				guard.defer_destroy(cur);
			}

			cur = next;
			count += 1;
		}

		count
	}

	/// Number of entries currently linked. Diagnostic only; not used on the
	/// hot path.
	#[must_use]
	pub fn chain_len(&self, guard: &Guard) -> usize {
		let mut cur = self.head.load(Ordering::Acquire, guard);
		let mut len = 0;

		while let Some(node) = unsafe { cur.as_ref() } {
			len += 1;
			cur = node.next.load(Ordering::Acquire, guard);
		}

		len
	}
}

impl Drop for Bucket {
	fn drop(&mut self) {
		// the table is being torn down; no readers remain, so a direct
		// (non-deferred) walk is sound.
		unsafe {
			let guard = crate::reclaim::pin();
			let mut cur = self.head.load(Ordering::Relaxed, &guard);

			while !cur.is_null() {
				let owned = cur.into_owned();
				let next = owned.next.load(Ordering::Relaxed, &guard);
				drop(owned);
				cur = next;
			}
		}
	}
}

/// The fixed-size array of [`SLOTS`] buckets.
pub struct BucketTable {
	buckets: Box<[Bucket]>,
}

impl BucketTable {
	#[must_use]
	pub fn new() -> Self {
		let buckets = (0..SLOTS).map(|_| Bucket::new()).collect::<Vec<_>>();

		BucketTable {
			buckets: buckets.into_boxed_slice(),
		}
	}

	#[must_use]
	pub fn bucket(&self, index: usize) -> &Bucket {
		&self.buckets[index]
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.buckets.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.buckets.is_empty()
	}
}

impl Default for BucketTable {
	fn default() -> Self {
		BucketTable::new()
	}
}
