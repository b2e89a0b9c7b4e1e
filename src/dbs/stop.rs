use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The iterator's internal one-shot cancellation signal, orthogonal to the
/// caller's [`crate::ctx::Context`]. A latch rather than a channel:
/// raising it twice is harmless, and there is nothing to close.
#[derive(Clone, Default)]
pub struct StopLatch(Arc<AtomicBool>);

impl StopLatch {
	pub fn new() -> Self {
		Self::default()
	}

	/// Raises the latch. Idempotent — may be called from any source driver
	/// or from `process` without coordination.
	pub fn raise(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_raised(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn raising_twice_is_harmless() {
		let latch = StopLatch::new();
		assert!(!latch.is_raised());
		latch.raise();
		latch.raise();
		assert!(latch.is_raised());
	}

	#[test]
	fn clones_share_state() {
		let latch = StopLatch::new();
		let clone = latch.clone();
		clone.raise();
		assert!(latch.is_raised());
	}
}
