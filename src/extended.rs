/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use crate::bitset::PermBitset256;

/// A per-operation-type refinement of a [`Decision`](crate::decision::Decision),
/// keyed by `op_type` inside one [`Entry`](crate::entry::Entry).
///
/// Modeled as three `Option<PermBitset256>` fields rather than a `specified`
/// flag word plus parallel bitsets, so "present" and "specified" can never
/// drift apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedDecision {
	pub op_type: u8,
	pub allowed: Option<PermBitset256>,
	pub auditallow: Option<PermBitset256>,
	pub dontaudit: Option<PermBitset256>,
}

impl ExtendedDecision {
	#[must_use]
	pub fn new(op_type: u8) -> Self {
		ExtendedDecision {
			op_type,
			..ExtendedDecision::default()
		}
	}

	#[must_use]
	pub fn allows(&self, number: u8) -> bool {
		self.allowed.as_ref().is_some_and(|bitset| bitset.test(number))
	}

	#[must_use]
	pub fn must_audit_allow(&self, number: u8) -> bool {
		self.auditallow.as_ref().is_some_and(|bitset| bitset.test(number))
	}

	#[must_use]
	pub fn must_not_audit_deny(&self, number: u8) -> bool {
		self.dontaudit.as_ref().is_some_and(|bitset| bitset.test(number))
	}

	/// Copies only the word relevant to `number` out of each present
	/// sub-bitset, mirroring the kernel's `avc_quick_copy_operation_decision`.
	#[must_use]
	pub fn quick_copy(&self, number: u8) -> ExtendedDecision {
		let quick = |src: &Option<PermBitset256>| {
			src.as_ref().map(|bitset| {
				let mut copy = PermBitset256::new();
				copy.quick_copy_from(bitset, number);
				copy
			})
		};

		ExtendedDecision {
			op_type: self.op_type,
			allowed: quick(&self.allowed),
			auditallow: quick(&self.auditallow),
			dontaudit: quick(&self.dontaudit),
		}
	}
}

/// The set of [`ExtendedDecision`]s owned by one [`Entry`](crate::entry::Entry),
/// unique by `op_type`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedDecisionList {
	/// "This operation type has been computed at least once" — distinguishes
	/// unknown from known-empty.
	type_bitmap: PermBitset256,
	decisions: Vec<ExtendedDecision>,
}

impl ExtendedDecisionList {
	#[must_use]
	pub fn new() -> Self {
		ExtendedDecisionList::default()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.decisions.is_empty()
	}

	#[must_use]
	pub fn is_known(&self, op_type: u8) -> bool {
		self.type_bitmap.test(op_type)
	}

	#[must_use]
	pub fn find(&self, op_type: u8) -> Option<&ExtendedDecision> {
		self.decisions.iter().find(|decision| decision.op_type == op_type)
	}

	/// Appends `decision`, replacing any existing entry for the same
	/// `op_type`. Marks the type known in `type_bitmap` regardless.
	pub fn add(&mut self, decision: ExtendedDecision) {
		self.type_bitmap.set(decision.op_type);
		self.decisions.retain(|existing| existing.op_type != decision.op_type);
		self.decisions.push(decision);
	}
}
