/*
 * Copyright (c) Kia Shakiba
 *
 * This source code is licensed under the GNU AGPLv3 license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::env;

const THRESHOLD_ENV: &str = "AVC_CACHE_THRESHOLD";

/// The soft eviction threshold used when no explicit value is configured.
/// Matches the kernel AVC's `AVC_DEF_CACHE_THRESHOLD`.
pub const DEFAULT_THRESHOLD: usize = 512;

/// Cache-wide tunables, resolved once at construction.
#[derive(Debug, Clone, Copy)]
pub struct Config {
	pub threshold: usize,
}

impl Config {
	/// Reads `AVC_CACHE_THRESHOLD` from the environment, falling back to
	/// [`DEFAULT_THRESHOLD`] if it is unset or unparsable.
	#[must_use]
	pub fn from_env() -> Self {
		let threshold = env::var(THRESHOLD_ENV)
			.ok()
			.and_then(|value| value.parse().ok())
			.unwrap_or(DEFAULT_THRESHOLD);

		Config { threshold }
	}
}

impl Default for Config {
	fn default() -> Self {
		Config {
			threshold: DEFAULT_THRESHOLD,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_uses_the_kernel_matching_threshold() {
		assert_eq!(Config::default().threshold, DEFAULT_THRESHOLD);
	}
}
