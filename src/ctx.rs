//! The caller-driven execution context: timeout/cancellation plumbing
//! external to the iterator's own `stop` latch. Built on
//! `tokio_util::sync::CancellationToken`, the idiomatic primitive for this
//! once the async stack already depends on `tokio`.

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct Context {
	token: CancellationToken,
	deadline: Option<Instant>,
}

impl Context {
	pub fn background() -> Self {
		Self { token: CancellationToken::new(), deadline: None }
	}

	pub fn with_timeout(timeout: Duration) -> Self {
		Self { token: CancellationToken::new(), deadline: Some(Instant::now() + timeout) }
	}

	/// A child context that inherits the parent's deadline and is
	/// cancelled whenever the parent is, but can also be cancelled
	/// independently (used to scope a single iterator's cancellation
	/// without affecting sibling statements in the same session).
	pub fn child(&self) -> Self {
		Self { token: self.token.child_token(), deadline: self.deadline }
	}

	pub fn cancel(&self) {
		self.token.cancel();
	}

	pub fn is_done(&self) -> bool {
		self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
	}
}

impl Default for Context {
	fn default() -> Self {
		Self::background()
	}
}
