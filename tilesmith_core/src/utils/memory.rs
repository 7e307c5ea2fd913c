//! Process memory probe used by the worker's restart-on-bloat check.

/// Resident set size of the current process in bytes, or `None` where the
/// information is unavailable. External native renderers are the usual
/// source of growth, so the worker exits between jobs once a configured
/// limit is exceeded and lets the supervisor restart it.
#[cfg(target_os = "linux")]
pub fn resident_set_size() -> Option<u64> {
	let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
	let rss_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
	Some(rss_pages * 4096)
}

#[cfg(not(target_os = "linux"))]
pub fn resident_set_size() -> Option<u64> {
	None
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	#[cfg(target_os = "linux")]
	fn reports_nonzero_rss() {
		assert!(resident_set_size().unwrap() > 0);
	}
}
