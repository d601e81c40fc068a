/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use log::warn;

use crate::error::CacheError;
use crate::key::{Sid, TClass};

/// Everything an [`AuditSink`] needs to produce a log record for one
/// decision. `ssid_context`/`tsid_context` are resolved via
/// [`PolicyEngine::sid_to_context`](crate::policy_engine::PolicyEngine::sid_to_context)
/// only when a record is actually going to be audited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
	pub ssid: Sid,
	pub tsid: Sid,
	pub tclass: TClass,
	pub requested: u32,
	pub denied: u32,
	pub ssid_context: String,
	pub tsid_context: String,
}

impl AuditRecord {
	#[must_use]
	pub fn is_denial(&self) -> bool {
		self.denied != 0
	}
}

/// The audit boundary. Implementations typically format and hand the
/// record to whatever logging/audit subsystem the host application uses.
///
/// `may_block` mirrors the kernel's `MAY_NOT_BLOCK`: a caller in a context
/// that cannot block (e.g. holding a spinlock-equivalent) passes `false`,
/// and a sink that would need to block — resolving a context string,
/// writing to a full ring buffer — must fail with
/// [`CacheError::WouldBlock`] instead of blocking.
pub trait AuditSink: Send + Sync {
	fn audit(&self, record: &AuditRecord, may_block: bool) -> Result<(), CacheError>;
}

/// Discards every record. Used where no audit trail is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
	fn audit(&self, _record: &AuditRecord, _may_block: bool) -> Result<(), CacheError> {
		Ok(())
	}
}

/// Emits one [`log::warn!`] line per record via the `log` crate, matching
/// the density the rest of the crate uses for policy-boundary events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
	fn audit(&self, record: &AuditRecord, _may_block: bool) -> Result<(), CacheError> {
		if record.is_denial() {
			warn!(
				"avc: denied {{ scontext={} tcontext={} tclass={} requested={:#x} denied={:#x} }}",
				record.ssid_context, record.tsid_context, record.tclass, record.requested, record.denied,
			);
		} else {
			warn!(
				"avc: granted {{ scontext={} tcontext={} tclass={} requested={:#x} }}",
				record.ssid_context, record.tsid_context, record.tclass, record.requested,
			);
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn is_denial_reflects_the_denied_mask() {
		let record = AuditRecord {
			ssid: 1,
			tsid: 2,
			tclass: 3,
			requested: 0b1,
			denied: 0,
			ssid_context: "sid:1".to_string(),
			tsid_context: "sid:2".to_string(),
		};

		assert!(!record.is_denial());

		let record = AuditRecord { denied: 0b1, ..record };
		assert!(record.is_denial());
	}

	#[test]
	fn null_sink_never_fails() {
		let sink = NullAuditSink;

		let record = AuditRecord {
			ssid: 1,
			tsid: 1,
			tclass: 1,
			requested: 1,
			denied: 1,
			ssid_context: "sid:1".to_string(),
			tsid_context: "sid:1".to_string(),
		};

		assert!(sink.audit(&record, false).is_ok());
	}
}
