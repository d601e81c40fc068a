/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Error)]
pub enum CacheError {
	#[error("internal error")]
	Internal,

	#[error("access denied")]
	AccessDenied,

	#[error("the supplied seqno is older than the cache's latest seqno")]
	StaleSeqno,

	#[error("no entry matched the supplied key and seqno")]
	NotFound,

	#[error("could not allocate a new entry")]
	OutOfMemory,

	#[error("the audit sink requires blocking but the caller asked not to block")]
	WouldBlock,

	#[error("the cache has been disabled")]
	Disabled,
}
