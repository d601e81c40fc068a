/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Minimal diagnostic CLI: drives an [`avc::Avc`] with a toy policy engine
//! through a small synthetic workload and prints its hash and hit-ratio
//! statistics. Not wired to any real policy backend — useful for eyeballing
//! reclaim and bucket-distribution behavior.

use avc::{
	Avc, Config, Decision, ExtendedDecision, NullAuditSink, PolicyEngine, Sid, TClass,
};

struct TrivialPolicyEngine;

impl PolicyEngine for TrivialPolicyEngine {
	fn compute_av(&self, ssid: Sid, tsid: Sid, _tclass: TClass) -> Decision {
		let allowed = if (ssid ^ tsid) % 7 == 0 { 0 } else { u32::MAX };
		Decision::new(allowed, 0, u32::MAX, 0, 0)
	}

	fn compute_extended(&self, _ssid: Sid, _tsid: Sid, _tclass: TClass, op_type: u8) -> ExtendedDecision {
		ExtendedDecision::new(op_type)
	}

	fn sid_to_context(&self, sid: Sid) -> Result<String, avc::CacheError> {
		Ok(format!("sid:{sid}"))
	}

	fn seqno(&self) -> u32 {
		1
	}
}

fn main() {
	env_logger::init();

	let avc = Avc::new(TrivialPolicyEngine, NullAuditSink, Config::default());

	for ssid in 0..2_000u32 {
		let tsid = ssid.wrapping_mul(2654435761) % 4096;
		let _ = avc.has_perm(ssid, tsid, 0, 0b1, false);
		let _ = avc.has_perm(ssid, tsid, 0, 0b1, false);
	}

	let stats = avc.stats();
	let hash_stats = avc.get_hash_stats();

	println!("lookups:        {}", stats.lookups);
	println!("hits:           {}", stats.hits);
	println!("misses:         {}", stats.misses);
	println!("allocations:    {}", stats.allocations);
	println!("reclaims:       {}", stats.reclaims);
	println!("miss ratio:     {:.4}", stats.miss_ratio());
	println!();
	println!("slots:          {}", hash_stats.slots);
	println!("entries:        {}", hash_stats.entries);
	println!("longest chain:  {}", hash_stats.longest_chain);
}
