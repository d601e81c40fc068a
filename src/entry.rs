/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use crate::decision::Decision;
use crate::extended::ExtendedDecisionList;
use crate::key::Key;

/// One cached (ssid, tsid, tclass) decision record.
///
/// Immutable once linked into a [`Bucket`](crate::bucket::Bucket) — every
/// mutation constructs a new `Entry` and swaps it in.
#[derive(Debug, Clone)]
pub struct Entry {
	pub key: Key,
	pub decision: Decision,
	pub extended: Option<ExtendedDecisionList>,
}

impl Entry {
	#[must_use]
	pub fn new(key: Key, decision: Decision, extended: Option<ExtendedDecisionList>) -> Self {
		Entry {
			key,
			decision,
			extended,
		}
	}

	/// Builds a copy-on-write successor to `self` by cloning the decision and
	/// deep-copying the extended list, ready for a caller to mutate before
	/// linking it in via [`Bucket::replace`](crate::bucket::Bucket::replace).
	#[must_use]
	pub fn cow(&self) -> Self {
		Entry {
			key: self.key,
			decision: self.decision,
			extended: self.extended.clone(),
		}
	}
}
