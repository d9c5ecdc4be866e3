// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for one coordinator's refresh episodes.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	recovered: AtomicU64,
	expired: AtomicU64,
	failed: AtomicU64,
	queued: AtomicU64,
}
impl RefreshMetrics {
	/// Number of refresh episodes started.
	///
	/// Episodes that find no stored session are not counted.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Number of refreshes that produced a new access token.
	pub fn recovered(&self) -> u64 {
		self.recovered.load(Ordering::Relaxed)
	}

	/// Number of refreshes that ended the session.
	pub fn expired(&self) -> u64 {
		self.expired.load(Ordering::Relaxed)
	}

	/// Number of refreshes that failed without ending the session.
	pub fn failed(&self) -> u64 {
		self.failed.load(Ordering::Relaxed)
	}

	/// Number of requests parked behind an in-flight refresh.
	pub fn queued(&self) -> u64 {
		self.queued.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_recovered(&self) {
		self.recovered.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_expired(&self) {
		self.expired.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failed(&self) {
		self.failed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_queued(&self) {
		self.queued.fetch_add(1, Ordering::Relaxed);
	}
}
