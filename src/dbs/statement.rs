//! The statement AST this core consumes: an exhaustive tagged enum over
//! Select/Create/Update/Delete/Insert/Upsert/Relate, rather than a generic
//! untyped AST node.

use crate::expr::{Expr, Part};
use crate::key::Thing;
use crate::kvs::PermSlot;

/// A MODEL generator spec (`|tb:min..max step inc|`).
#[derive(Clone, Debug)]
pub struct ModelSpec {
	pub table: String,
	pub min: f64,
	pub max: f64,
	pub inc: f64,
}

impl ModelSpec {
	/// A `|tb:count|` count-mode generator: produces `count` records with
	/// freshly generated unique ids. By construction `min == max == count`,
	/// so the INC==0-with-MIN!=MAX guard in `run_model` can never
	/// legitimately fire for a well-formed count generator.
	pub fn count(table: impl Into<String>, count: u32) -> Self {
		Self { table: table.into(), min: count as f64, max: count as f64, inc: 0.0 }
	}

	pub fn range(table: impl Into<String>, min: f64, max: f64, inc: f64) -> Self {
		Self { table: table.into(), min, max, inc }
	}
}

/// The closed sum type of record sources a statement's `what` clause can
/// resolve to, one variant per source driver. Named explicitly rather than
/// left as untyped values.
#[derive(Clone, Debug)]
pub enum What {
	Thing(Thing),
	Table(String),
	Batch(Vec<Thing>),
	Model(ModelSpec),
	/// A pre-resolved input sequence for a mutating/RELATE subquery.
	SubqueryOther(Vec<Value>),
	/// A pre-resolved input sequence for a read subquery.
	SubqueryQuery(Vec<Value>),
	/// A CREATE/INSERT/UPSERT payload array, tagged with the table the
	/// records land in.
	InlineArray(String, Vec<Value>),
}

use crate::expr::Value;

/// One projected output field: an expression aliased to an output name.
#[derive(Clone, Debug)]
pub struct Field {
	pub expr: Expr,
	pub alias: String,
}

impl Field {
	pub fn new(expr: Expr, alias: impl Into<String>) -> Self {
		Self { expr, alias: alias.into() }
	}
}

/// The SELECT field list: either `*` or an explicit projection.
#[derive(Clone, Debug)]
pub enum Fields {
	All,
	Select(Vec<Field>),
}

/// One ORDER BY key: the expression to sort by, and its direction.
#[derive(Clone, Debug)]
pub struct OrderKey {
	pub expr: Expr,
	/// `true` = ascending.
	pub asc: bool,
}

/// A CREATE/UPDATE/DELETE/RELATE statement — everything but SELECT ignores
/// limit/start/version/split/group/order.
#[derive(Clone, Debug)]
pub struct MutateStatement {
	pub what: Vec<What>,
	pub cond: Option<Expr>,
}

#[derive(Clone, Debug)]
pub struct InsertStatement {
	pub into: String,
	pub data: Vec<Value>,
}

#[derive(Clone, Debug)]
pub struct SelectStatement {
	pub expr: Fields,
	pub what: Vec<What>,
	pub cond: Option<Expr>,
	pub split: Vec<Vec<Part>>,
	pub group: Option<Vec<Expr>>,
	pub order: Option<Vec<OrderKey>>,
	pub limit: Option<Expr>,
	pub start: Option<Expr>,
	pub version: Option<Expr>,
}

impl SelectStatement {
	pub fn new(what: Vec<What>) -> Self {
		Self {
			expr: Fields::All,
			what,
			cond: None,
			split: Vec::new(),
			group: None,
			order: None,
			limit: None,
			start: None,
			version: None,
		}
	}
}

#[derive(Clone, Debug)]
pub enum Statement {
	Select(SelectStatement),
	Create(MutateStatement),
	Update(MutateStatement),
	Delete(MutateStatement),
	Insert(InsertStatement),
	Upsert(InsertStatement),
	Relate(MutateStatement),
}

impl Statement {
	pub fn is_select(&self) -> bool {
		matches!(self, Statement::Select(_))
	}

	pub fn is_create(&self) -> bool {
		matches!(self, Statement::Create(_))
	}

	/// Every statement kind but `Select` mutates storage; the view-lock
	/// prohibition and the permission-slot mapping below both key off this.
	pub fn is_mutating(&self) -> bool {
		!self.is_select()
	}

	/// Maps statement kind to permission-policy slot: Select→select,
	/// Create/Insert/Relate→create, Update/Upsert→update, Delete→delete.
	pub fn perm_slot(&self) -> PermSlot {
		match self {
			Statement::Select(_) => PermSlot::Select,
			Statement::Create(_) | Statement::Insert(_) | Statement::Relate(_) => PermSlot::Create,
			Statement::Update(_) | Statement::Upsert(_) => PermSlot::Update,
			Statement::Delete(_) => PermSlot::Delete,
		}
	}

	pub fn what(&self) -> Vec<What> {
		match self {
			Statement::Select(s) => s.what.clone(),
			Statement::Create(s) | Statement::Update(s) | Statement::Delete(s) | Statement::Relate(s) => {
				s.what.clone()
			}
			Statement::Insert(s) | Statement::Upsert(s) => {
				vec![What::InlineArray(s.into.clone(), s.data.clone())]
			}
		}
	}

	pub fn cond(&self) -> Option<&Expr> {
		match self {
			Statement::Select(s) => s.cond.as_ref(),
			Statement::Create(s) | Statement::Update(s) | Statement::Delete(s) | Statement::Relate(s) => {
				s.cond.as_ref()
			}
			Statement::Insert(_) | Statement::Upsert(_) => None,
		}
	}

	pub fn expr(&self) -> Option<&Fields> {
		match self {
			Statement::Select(s) => Some(&s.expr),
			_ => None,
		}
	}

	pub fn split(&self) -> Option<&[Vec<Part>]> {
		match self {
			Statement::Select(s) if !s.split.is_empty() => Some(&s.split),
			_ => None,
		}
	}

	pub fn group(&self) -> Option<&[Expr]> {
		match self {
			Statement::Select(s) => s.group.as_deref(),
			_ => None,
		}
	}

	pub fn order(&self) -> Option<&[OrderKey]> {
		match self {
			Statement::Select(s) => s.order.as_deref(),
			_ => None,
		}
	}

	pub fn limit_expr(&self) -> Option<&Expr> {
		match self {
			Statement::Select(s) => s.limit.as_ref(),
			_ => None,
		}
	}

	pub fn start_expr(&self) -> Option<&Expr> {
		match self {
			Statement::Select(s) => s.start.as_ref(),
			_ => None,
		}
	}

	pub fn version_expr(&self) -> Option<&Expr> {
		match self {
			Statement::Select(s) => s.version.as_ref(),
			_ => None,
		}
	}
}
