//! Client-generated correlation nonces.
//!
//! Nonces are snowflakes: milliseconds since the platform epoch shifted left
//! by 22 bits, with a process-wide counter in the low bits so two nonces
//! minted in the same millisecond still differ.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// 2015-01-01T00:00:00Z in unix milliseconds.
pub const PLATFORM_EPOCH_MS: u64 = 1_420_070_400_000;

static COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn generate() -> String {
	let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(PLATFORM_EPOCH_MS);
	from_parts(now_ms, COUNTER.fetch_add(1, Ordering::Relaxed)).to_string()
}

fn from_parts(unix_ms: u64, counter: u64) -> u64 {
	(unix_ms.saturating_sub(PLATFORM_EPOCH_MS) << 22) | (counter & 0x3F_FFFF)
}

/// Unix milliseconds encoded in a snowflake id.
pub fn timestamp_ms(snowflake: &str) -> Option<u64> {
	snowflake.parse::<u64>().ok().map(|id| (id >> 22) + PLATFORM_EPOCH_MS)
}
