//! SPLIT: array field explosion.

use crate::expr::{Part, Value};

/// Applies each split path in turn, each operating on the output of the
/// previous. Splits compose in declared order.
pub fn apply_split(docs: Vec<Value>, paths: &[Vec<Part>]) -> Vec<Value> {
	let mut current = docs;
	for path in paths {
		current = split_one(current, path);
	}
	current
}

fn split_one(docs: Vec<Value>, path: &[Part]) -> Vec<Value> {
	let mut out = Vec::with_capacity(docs.len());
	for doc in docs {
		let leaf = doc.pick(path);
		match leaf {
			Value::Array(items) if !items.is_empty() => {
				for item in items {
					let mut cloned = doc.clone();
					cloned.set(path, item);
					out.push(cloned);
				}
			}
			// An empty sequence has no element to walk; keep the record
			// with the split field cleared rather than dropping it
			// silently.
			Value::Array(_) => {
				let mut cloned = doc.clone();
				cloned.set(path, Value::None);
				out.push(cloned);
			}
			other => {
				let mut cloned = doc;
				cloned.set(path, other);
				out.push(cloned);
			}
		}
	}
	out
}
