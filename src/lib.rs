//! A concurrent access vector cache: a read-mostly, hash-bucketed cache of
//! mandatory access control decisions sitting in front of a (blocking)
//! policy engine, with epoch-based reclamation standing in for the
//! kernel's RCU grace period.

mod audit;
mod avc;
mod bitset;
mod bucket;
mod config;
mod decision;
mod entry;
mod error;
mod extended;
mod global;
mod key;
mod lookup;
mod notify;
mod policy_engine;
mod reclaim;
mod stats;
mod update;

pub use crate::audit::{AuditRecord, AuditSink, LogAuditSink, NullAuditSink};
pub use crate::avc::{Avc, HashStats};
pub use crate::bitset::PermBitset256;
pub use crate::config::Config;
pub use crate::decision::{Decision, PermMask, PERMISSIVE};
pub use crate::entry::Entry;
pub use crate::error::CacheError;
pub use crate::extended::{ExtendedDecision, ExtendedDecisionList};
pub use crate::global::{global, install};
pub use crate::key::{Key, Sid, TClass, WILD, sid_matches};
pub use crate::notify::Callback;
pub use crate::policy_engine::PolicyEngine;
pub use crate::stats::StatsSnapshot;
pub use crate::update::Event;
