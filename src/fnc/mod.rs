//! The built-in function registry: scalar functions usable in a field
//! projection, and aggregate functions usable inside a GROUP projection.
//!
//! Narrowed to the handful the iterator's own tests exercise; a real
//! catalogue (string/time/crypto/…) is an external collaborator.

use crate::err::Error;
use crate::expr::{Number, Value};
use anyhow::{bail, Result};

/// A scalar function: called with its already-evaluated argument values,
/// returns one value. Used by field-list projection outside GROUP.
pub type ScalarFn = fn(&[Value]) -> Result<Value>;

/// An aggregate function: called with the collected values of its first
/// argument across a GROUP bucket, plus the already-evaluated scalar values
/// of any remaining arguments. `count()` ignores both and just reports the
/// bucket size.
pub type AggregateFn = fn(collected: &[Value], rest: &[Value]) -> Result<Value>;

pub fn lookup_scalar(name: &str) -> Option<ScalarFn> {
	match name {
		"array::len" => Some(array_len),
		_ => None,
	}
}

pub fn lookup_aggregate(name: &str) -> Option<AggregateFn> {
	match name {
		"count" => Some(count),
		"math::sum" => Some(math_sum),
		"math::mean" => Some(math_mean),
		"math::min" => Some(math_min),
		"math::max" => Some(math_max),
		_ => None,
	}
}

/// Dispatches a function call, trying the aggregate table if `aggregate`
/// is set and falling back to scalar otherwise. A name present in neither
/// table is `Error::UnknownFunction`.
pub fn call(name: &str, aggregate: bool, collected: &[Value], rest: &[Value]) -> Result<Value> {
	if aggregate {
		if let Some(f) = lookup_aggregate(name) {
			return f(collected, rest);
		}
		bail!(Error::UnknownFunction(name.to_string()));
	}
	if let Some(f) = lookup_scalar(name) {
		return f(rest);
	}
	bail!(Error::UnknownFunction(name.to_string()));
}

fn count(collected: &[Value], _rest: &[Value]) -> Result<Value> {
	Ok(Value::from(collected.len() as i64))
}

fn numbers_of(collected: &[Value]) -> Vec<f64> {
	collected
		.iter()
		.filter_map(|v| match v {
			Value::Number(n) => Some(n.as_f64()),
			_ => None,
		})
		.collect()
}

fn math_sum(collected: &[Value], _rest: &[Value]) -> Result<Value> {
	let sum: f64 = numbers_of(collected).into_iter().sum();
	Ok(Value::from(sum))
}

fn math_mean(collected: &[Value], _rest: &[Value]) -> Result<Value> {
	let nums = numbers_of(collected);
	if nums.is_empty() {
		return Ok(Value::from(0.0));
	}
	let sum: f64 = nums.iter().sum();
	Ok(Value::from(sum / nums.len() as f64))
}

fn math_min(collected: &[Value], _rest: &[Value]) -> Result<Value> {
	let nums = numbers_of(collected);
	match nums.into_iter().min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)) {
		Some(v) => Ok(Value::from(v)),
		None => Ok(Value::None),
	}
}

fn math_max(collected: &[Value], _rest: &[Value]) -> Result<Value> {
	let nums = numbers_of(collected);
	match nums.into_iter().max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)) {
		Some(v) => Ok(Value::from(v)),
		None => Ok(Value::None),
	}
}

fn array_len(args: &[Value]) -> Result<Value> {
	match args.first() {
		Some(Value::Array(a)) => Ok(Value::Number(Number::Int(a.len() as i64))),
		_ => Ok(Value::Number(Number::Int(0))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn count_reports_bucket_size_regardless_of_contents() {
		let v = call("count", true, &[Value::from(1i64), Value::from(2i64)], &[]).unwrap();
		assert_eq!(v, Value::from(2i64));
	}

	#[test]
	fn math_sum_ignores_non_numeric_members() {
		let v = math_sum(&[Value::from(1i64), Value::from("x"), Value::from(2.5)], &[]).unwrap();
		assert_eq!(v, Value::from(3.5));
	}

	#[test]
	fn unknown_function_errors() {
		assert!(call("nope", false, &[], &[]).is_err());
	}
}
