//! The narrow expression-evaluation seam the iterator calls through,
//! standing in for a full expression evaluator crate.

use crate::err::Error;
use crate::expr::{Expr, Value};
use crate::fnc;
use anyhow::{bail, Result};
use async_trait::async_trait;

/// Which clause a scalar expression came from, so a failure to evaluate it
/// reports as the right kind of error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarKind {
	Limit,
	Start,
	Version,
}

impl ScalarKind {
	fn invalid(self, msg: String) -> Error {
		match self {
			ScalarKind::Limit => Error::InvalidLimit(msg),
			ScalarKind::Start => Error::InvalidStart(msg),
			ScalarKind::Version => Error::InvalidVersion(msg),
		}
	}
}

/// Evaluates expressions on the iterator's behalf. Three distinct modes:
/// a scalar mode with no document context (LIMIT/START/VERSION), a
/// permission-gate mode that explicitly forbids field references, and a
/// per-document mode used by WHERE/field-list projection.
#[async_trait]
pub trait Evaluator: Send + Sync {
	/// Evaluates `expr` to an integer with no document context, for
	/// LIMIT/START/VERSION. `kind` identifies which clause this is, so a
	/// failure reports as `InvalidLimit`/`InvalidStart`/`InvalidVersion`
	/// rather than a single generic error.
	async fn fetch_scalar(&self, kind: ScalarKind, expr: &Expr) -> Result<i64>;

	/// Evaluates a permission predicate with no document context: any
	/// field reference inside `expr` is a hard error, since the gate runs
	/// before a document exists to reference.
	async fn fetch_perm(&self, expr: &Expr) -> Result<bool>;

	/// Evaluates `expr` against `doc`, used for WHERE/field projection and
	/// GROUP/ORDER key extraction.
	fn fetch(&self, expr: &Expr, doc: &Value) -> Result<Value>;
}

/// The evaluator this crate ships: literals evaluate to themselves, idioms
/// `pick` the document (or error outside a document context), and function
/// calls route through [`fnc::call`].
#[derive(Default, Clone, Copy)]
pub struct DefaultEvaluator;

impl DefaultEvaluator {
	fn eval_no_doc(&self, expr: &Expr) -> Result<Value> {
		match expr {
			Expr::Literal(v) => Ok(v.clone()),
			Expr::Idiom(parts) => {
				let path = parts.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(".");
				bail!(Error::FieldInPermsExpr(path));
			}
			Expr::Function { name, args, aggregate } => {
				let mut values = Vec::with_capacity(args.len());
				for a in args {
					values.push(self.eval_no_doc(a)?);
				}
				fnc::call(name, *aggregate, &[], &values)
			}
		}
	}
}

#[async_trait]
impl Evaluator for DefaultEvaluator {
	async fn fetch_scalar(&self, kind: ScalarKind, expr: &Expr) -> Result<i64> {
		match self.eval_no_doc(expr)? {
			Value::Number(n) => Ok(n.as_f64() as i64),
			other => bail!(kind.invalid(format!("expected a number, found {other}"))),
		}
	}

	async fn fetch_perm(&self, expr: &Expr) -> Result<bool> {
		Ok(self.eval_no_doc(expr)?.is_truthy())
	}

	fn fetch(&self, expr: &Expr, doc: &Value) -> Result<Value> {
		match expr {
			Expr::Literal(v) => Ok(v.clone()),
			Expr::Idiom(parts) => Ok(doc.pick(parts)),
			Expr::Function { name, args, aggregate } => {
				let mut values = Vec::with_capacity(args.len());
				for a in args {
					values.push(self.fetch(a, doc)?);
				}
				fnc::call(name, *aggregate, &[], &values)
			}
		}
	}
}
