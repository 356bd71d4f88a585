use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;

/// Get the current UTC time in milliseconds since the Unix epoch
pub fn utc_timestamp_millis() -> anyhow::Result<u64> {
	let millis = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.context("System clock is before the Unix epoch")?
		.as_millis();
	u64::try_from(millis).context("Timestamp does not fit in 64 bits")
}
