//! The document processor: given a key, a stored
//! value, and an overlay document, evaluates one statement against one
//! record — condition, then projection, then (for mutating statements) the
//! write-back. Narrowed to the pieces this core needs: no triggers, events
//! or live-query notification.

use crate::dbs::eval::Evaluator;
use crate::dbs::statement::{Fields, Statement};
use crate::expr::{Object, Value};
use crate::key::Thing;
use crate::kvs::Transaction;
use anyhow::Result;

/// Merges a stored value with its overlay: overlay fields win field-by-field
/// when both sides are objects; otherwise the overlay replaces the stored
/// value outright, and either side alone passes through unchanged.
fn merge(stored: Option<Value>, overlay: Option<Value>) -> Value {
	match (stored, overlay) {
		(Some(Value::Object(mut base)), Some(Value::Object(patch))) => {
			for (k, v) in patch {
				base.insert(k, v);
			}
			Value::Object(base)
		}
		(_, Some(overlay)) => overlay,
		(Some(stored), None) => stored,
		(None, None) => Value::None,
	}
}

/// Processes one candidate record for `stmt`, returning `Ok(None)` when the
/// condition filters it out (not an error) and `Ok(Some(value))` with the
/// projected output otherwise.
pub async fn process(
	tx: &dyn Transaction,
	eval: &dyn Evaluator,
	stmt: &Statement,
	key: Option<&Thing>,
	stored: Option<Value>,
	overlay: Option<Value>,
) -> Result<Option<Value>> {
	let merged = merge(stored, overlay);

	if let Some(cond) = stmt.cond() {
		if !eval.fetch(cond, &merged)?.is_truthy() {
			return Ok(None);
		}
	}

	if stmt.is_mutating() {
		if let Some(key) = key {
			tx.put_thing(key, merged.clone()).await?;
		}
	}

	let projected = match stmt.expr() {
		None | Some(Fields::All) => merged,
		Some(Fields::Select(fields)) => {
			let mut out = Object::new();
			for field in fields {
				out.insert(field.alias.clone(), eval.fetch(&field.expr, &merged)?);
			}
			Value::Object(out)
		}
	};
	Ok(Some(projected))
}
