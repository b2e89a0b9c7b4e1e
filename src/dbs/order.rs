//! ORDER: multi-key sort with lazy, memoized key extraction. A real
//! optimization, not an aesthetic choice — it's a genuine win when an
//! early key already breaks most ties.

use super::eval::Evaluator;
use super::statement::OrderKey;
use crate::expr::Value;
use std::cell::OnceCell;
use std::cmp::Ordering;

/// Sorts `docs` by `keys` in order, evaluating each key expression against
/// a document at most once no matter how many comparisons touch it.
pub fn apply_order(docs: Vec<Value>, keys: &[OrderKey], eval: &dyn Evaluator) -> Vec<Value> {
	if keys.is_empty() {
		return docs;
	}

	let cache: Vec<Vec<OnceCell<Value>>> =
		docs.iter().map(|_| keys.iter().map(|_| OnceCell::new()).collect()).collect();

	let key_of = |doc_idx: usize, key_idx: usize| -> &Value {
		cache[doc_idx][key_idx]
			.get_or_init(|| eval.fetch(&keys[key_idx].expr, &docs[doc_idx]).unwrap_or(Value::None))
	};

	let mut idx: Vec<usize> = (0..docs.len()).collect();
	idx.sort_by(|&a, &b| {
		for (ki, k) in keys.iter().enumerate() {
			let c = key_of(a, ki).compare(key_of(b, ki));
			if c != Ordering::Equal {
				return if k.asc { c } else { c.reverse() };
			}
		}
		Ordering::Equal
	});

	idx.into_iter().map(|i| docs[i].clone()).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dbs::eval::DefaultEvaluator;
	use crate::expr::{Expr, Object};

	fn person(age: i64) -> Value {
		let mut o = Object::new();
		o.insert("age".into(), Value::from(age));
		Value::Object(o)
	}

	#[test]
	fn sorts_descending_by_age() {
		let docs = vec![person(10), person(30), person(20), person(40)];
		let keys = [OrderKey { expr: Expr::field("age"), asc: false }];
		let eval = DefaultEvaluator;
		let out = apply_order(docs, &keys, &eval);
		let ages: Vec<i64> = out
			.iter()
			.map(|d| match d.as_object().unwrap().get("age").unwrap() {
				Value::Number(n) => n.as_f64() as i64,
				_ => 0,
			})
			.collect();
		assert_eq!(ages, vec![40, 30, 20, 10]);
	}

	#[test]
	fn order_over_empty_keys_is_identity() {
		let docs = vec![person(30), person(10)];
		let eval = DefaultEvaluator;
		let out = apply_order(docs.clone(), &[], &eval);
		assert_eq!(out, docs);
	}
}
