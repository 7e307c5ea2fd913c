//! In-memory latency samples with windowed statistics. Mean and standard
//! deviation are computed with Welford's online algorithm over the samples
//! inside each window, so no per-window state has to be maintained between
//! snapshots.

use serde_json::{Value, json};
use std::time::{Duration, Instant};

/// How long samples are kept.
const KEEP_PERIOD: Duration = Duration::from_secs(60 * 60);

const WINDOWS: [(&str, Duration); 3] = [
	("now", Duration::from_secs(5)),
	("5min", Duration::from_secs(5 * 60)),
	("hour", Duration::from_secs(60 * 60)),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
	Gets,
	Posts,
}

impl Table {
	pub fn from_byte(byte: u8) -> Option<Table> {
		match byte {
			b'g' => Some(Table::Gets),
			b'p' => Some(Table::Posts),
			_ => None,
		}
	}

	pub fn as_byte(self) -> u8 {
		match self {
			Table::Gets => b'g',
			Table::Posts => b'p',
		}
	}
}

#[derive(Default)]
pub struct StatsStore {
	gets: Vec<(Instant, u32)>,
	posts: Vec<(Instant, u32)>,
}

impl StatsStore {
	pub fn new() -> StatsStore {
		StatsStore::default()
	}

	fn table(&self, table: Table) -> &Vec<(Instant, u32)> {
		match table {
			Table::Gets => &self.gets,
			Table::Posts => &self.posts,
		}
	}

	pub fn add(&mut self, table: Table, microseconds: u32) {
		let now = Instant::now();
		match table {
			Table::Gets => self.gets.push((now, microseconds)),
			Table::Posts => self.posts.push((now, microseconds)),
		}
	}

	/// Drops samples older than the retention period.
	pub fn flush(&mut self) {
		let cutoff = Instant::now().checked_sub(KEEP_PERIOD);
		if let Some(cutoff) = cutoff {
			self.gets.retain(|(at, _)| *at >= cutoff);
			self.posts.retain(|(at, _)| *at >= cutoff);
		}
	}

	/// Count, mean and standard deviation of one table over one window.
	pub fn make(&self, table: Table, label: &str, window: Duration) -> Value {
		let cutoff = Instant::now().checked_sub(window);
		let mut n = 0u64;
		let mut mean = 0.0f64;
		let mut q = 0.0f64;
		for (at, microseconds) in self.table(table) {
			if cutoff.is_none_or(|cutoff| *at > cutoff) {
				n += 1;
				let x = f64::from(*microseconds);
				let next_mean = mean + (x - mean) / n as f64;
				q += (x - next_mean) * (x - mean);
				mean = next_mean;
			}
		}
		let dev = if n > 1 { (q / (n - 1) as f64).sqrt() } else { 0.0 };
		json!({ "time": label, "n": n, "avg": mean, "dev": dev })
	}

	fn windows(&self, table: Table) -> Vec<Value> {
		WINDOWS
			.iter()
			.map(|(label, window)| self.make(table, label, *window))
			.collect()
	}

	/// `pass` when the 5-minute window saw traffic.
	fn health(&self, table: Table) -> &'static str {
		let five_min = self.make(table, "5min", WINDOWS[1].1);
		if five_min["n"].as_u64().unwrap_or(0) > 0 {
			"pass"
		} else {
			"fail"
		}
	}

	/// The full snapshot served over TCP.
	pub fn snapshot(&self) -> Value {
		json!({
			"gets": self.windows(Table::Gets),
			"posts": self.windows(Table::Posts),
			"get": self.health(Table::Gets),
			"post": self.health(Table::Posts),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn welford_matches_the_textbook() {
		let mut store = StatsStore::new();
		for sample in [2u32, 4, 4, 4, 5, 5, 7, 9] {
			store.add(Table::Gets, sample);
		}
		let stats = store.make(Table::Gets, "now", Duration::from_secs(5));
		assert_eq!(stats["n"], 8);
		assert!((stats["avg"].as_f64().unwrap() - 5.0).abs() < 1e-9);
		// sample standard deviation of the classic example
		assert!((stats["dev"].as_f64().unwrap() - 2.138089935).abs() < 1e-6);
	}

	#[test]
	fn single_sample_has_zero_deviation() {
		let mut store = StatsStore::new();
		store.add(Table::Posts, 1000);
		let stats = store.make(Table::Posts, "now", Duration::from_secs(5));
		assert_eq!(stats["n"], 1);
		assert_eq!(stats["dev"], 0.0);
	}

	#[test]
	fn snapshot_reports_health() {
		let mut store = StatsStore::new();
		let snapshot = store.snapshot();
		assert_eq!(snapshot["get"], "fail");
		assert_eq!(snapshot["gets"].as_array().unwrap().len(), 3);

		store.add(Table::Gets, 123);
		let snapshot = store.snapshot();
		assert_eq!(snapshot["get"], "pass");
		assert_eq!(snapshot["post"], "fail");
	}

	#[test]
	fn table_bytes() {
		assert_eq!(Table::from_byte(b'g'), Some(Table::Gets));
		assert_eq!(Table::from_byte(b'p'), Some(Table::Posts));
		assert_eq!(Table::from_byte(b'x'), None);
		assert_eq!(Table::Gets.as_byte(), b'g');
	}
}
