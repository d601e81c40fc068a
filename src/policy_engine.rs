/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use crate::decision::Decision;
use crate::error::CacheError;
use crate::extended::ExtendedDecision;
use crate::key::{Sid, TClass};

/// The security server the cache sits in front of. Every call may block —
/// it is the boundary the cache exists to keep off the hot path, not a
/// cache-internal concern.
pub trait PolicyEngine: Send + Sync {
	/// Computes the full access vector for `(ssid, tsid, tclass)`,
	/// independent of which particular permission a caller is about to
	/// check. The returned `seqno` is ignored — the cache stamps its own.
	fn compute_av(&self, ssid: Sid, tsid: Sid, tclass: TClass) -> Decision;

	/// Computes the extended (per-command) decision for `op_type` within
	/// `(ssid, tsid, tclass)`.
	fn compute_extended(&self, ssid: Sid, tsid: Sid, tclass: TClass, op_type: u8) -> ExtendedDecision;

	/// Resolves `sid` to a human-readable context string, for audit
	/// formatting only — never consulted on the plain grant/deny path.
	fn sid_to_context(&self, sid: Sid) -> Result<String, CacheError>;

	/// The engine's current policy generation number.
	fn seqno(&self) -> u32;
}
