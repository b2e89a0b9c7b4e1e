//! GROUP with aggregates. Buckets use a structural key built from
//! [`Value::group_key_bytes`] rather than a textual rendering, so the
//! number `1` and the string `"1"` never collide in the same bucket.

use super::eval::Evaluator;
use super::statement::Fields;
use crate::err::Error;
use crate::expr::{Expr, Object, Value};
use anyhow::Result;
use std::collections::HashMap;

/// Groups `docs` by the tuple of `group_exprs` evaluated against each
/// record, then projects `fields` over each bucket (aggregate calls see
/// the whole bucket; plain fields take the first record's value).
pub fn apply_group(
	docs: Vec<Value>,
	group_exprs: &[Expr],
	fields: &Fields,
	eval: &dyn Evaluator,
) -> Result<Vec<Value>> {
	if group_exprs.is_empty() {
		return Ok(docs);
	}

	let mut order: Vec<Vec<u8>> = Vec::new();
	let mut buckets: HashMap<Vec<u8>, Vec<Value>> = HashMap::new();

	for doc in docs {
		let mut key = Vec::new();
		for expr in group_exprs {
			key.extend(eval.fetch(expr, &doc)?.group_key_bytes());
		}
		if !buckets.contains_key(&key) {
			order.push(key.clone());
		}
		buckets.entry(key).or_default().push(doc);
	}

	let mut out = Vec::with_capacity(order.len());
	for key in order {
		let bucket = buckets.remove(&key).expect("key was just inserted into order");
		out.push(project_bucket(&bucket, fields, eval)?);
	}
	Ok(out)
}

fn project_bucket(bucket: &[Value], fields: &Fields, eval: &dyn Evaluator) -> Result<Value> {
	let select = match fields {
		// GROUP always names explicit output fields; falling back to the
		// first record for `*` keeps this total without inventing
		// per-field semantics the statement never declared.
		Fields::All => return Ok(bucket.first().cloned().unwrap_or(Value::None)),
		Fields::Select(fields) => fields,
	};

	let mut out = Object::new();
	for field in select {
		let value = match &field.expr {
			Expr::Function { name, args, aggregate: true } => {
				let collected: Vec<Value> = match args.first() {
					Some(first_arg) => {
						let mut values = Vec::with_capacity(bucket.len());
						for doc in bucket {
							values.push(eval.fetch(first_arg, doc)?);
						}
						values
					}
					// `count()` with no arguments: the bucket itself is
					// what's being counted.
					None => bucket.iter().map(|_| Value::None).collect(),
				};
				let first_doc = bucket.first().unwrap_or(&Value::None);
				let mut rest = Vec::new();
				for arg in args.iter().skip(1) {
					rest.push(eval.fetch(arg, first_doc)?);
				}
				// An aggregate failure (unknown function, bad argument
				// shape) is localized to this bucket/field rather than
				// aborting the whole statement.
				match crate::fnc::call(name, true, &collected, &rest) {
					Ok(v) => v,
					Err(e) => Value::Strand(Error::AggregateError(name.clone(), e.to_string()).to_string()),
				}
			}
			expr => {
				let first_doc = bucket.first().unwrap_or(&Value::None);
				eval.fetch(expr, first_doc)?
			}
		};
		out.insert(field.alias.clone(), value);
	}
	Ok(Value::Object(out))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dbs::eval::DefaultEvaluator;
	use crate::dbs::statement::Field;
	use crate::expr::Expr;

	fn person(age: i64) -> Value {
		let mut o = Object::new();
		o.insert("age".into(), Value::from(age));
		Value::Object(o)
	}

	#[test]
	fn groups_by_age_and_counts_each_bucket() {
		let docs = vec![person(30), person(30), person(40)];
		let fields = Fields::Select(vec![
			Field::new(Expr::field("age"), "age"),
			Field::new(Expr::Function { name: "count".into(), args: vec![], aggregate: true }, "total"),
		]);
		let eval = DefaultEvaluator;
		let out = apply_group(docs, &[Expr::field("age")], &fields, &eval).unwrap();
		assert_eq!(out.len(), 2);
		let total: i64 = out
			.iter()
			.map(|d| match d.as_object().unwrap().get("total").unwrap() {
				Value::Number(n) => n.as_f64() as i64,
				_ => 0,
			})
			.sum();
		assert_eq!(total, 3);
	}

	#[test]
	fn group_over_empty_keys_is_identity() {
		let docs = vec![person(30)];
		let eval = DefaultEvaluator;
		let out = apply_group(docs.clone(), &[], &Fields::All, &eval).unwrap();
		assert_eq!(out, docs);
	}

	#[test]
	fn unknown_aggregate_function_localizes_to_the_field_without_aborting() {
		let docs = vec![person(30), person(30), person(40)];
		let fields = Fields::Select(vec![
			Field::new(Expr::field("age"), "age"),
			Field::new(
				Expr::Function { name: "math::median".into(), args: vec![Expr::field("age")], aggregate: true },
				"total",
			),
		]);
		let eval = DefaultEvaluator;
		let out = apply_group(docs, &[Expr::field("age")], &fields, &eval).unwrap();
		assert_eq!(out.len(), 2);
		for d in &out {
			assert!(matches!(d.as_object().unwrap().get("total").unwrap(), Value::Strand(_)));
		}
	}
}
