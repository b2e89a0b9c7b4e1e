//! Yield and windowing: the final start/limit slice applied after
//! Split/Group/Order, or directly to `result` when neither is configured.

use crate::expr::Value;

/// Drops the first `start` records, then truncates to `limit`. `None`
/// means "unset" (the statement's `-1` sentinel) for both.
pub fn apply_window(mut docs: Vec<Value>, start: Option<i64>, limit: Option<i64>) -> Vec<Value> {
	if let Some(start) = start {
		if start > 0 {
			let drop = (start as usize).min(docs.len());
			docs.drain(0..drop);
		}
	}
	if let Some(limit) = limit {
		if limit >= 0 {
			docs.truncate(limit as usize);
		}
	}
	docs
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn start_and_limit_select_a_window() {
		let docs: Vec<Value> = (0..4i64).map(Value::from).collect();
		let out = apply_window(docs, Some(1), Some(2));
		assert_eq!(out, vec![Value::from(1i64), Value::from(2i64)]);
	}

	#[test]
	fn unset_start_and_limit_is_identity() {
		let docs: Vec<Value> = (0..3i64).map(Value::from).collect();
		let out = apply_window(docs.clone(), None, None);
		assert_eq!(out, docs);
	}

	#[test]
	fn start_past_end_yields_empty() {
		let docs: Vec<Value> = (0..2i64).map(Value::from).collect();
		assert!(apply_window(docs, Some(10), None).is_empty());
	}
}
