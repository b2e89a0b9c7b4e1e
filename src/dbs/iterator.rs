//! The query iterator: source dispatch, per-record processing, and the
//! post-processing pipeline.

use super::eval::{Evaluator, ScalarKind};
use super::group::apply_group;
use super::options::Options;
use super::order::apply_order;
use super::perms::process_perms;
use super::result::apply_window;
use super::split::apply_split;
use super::statement::{Fields, ModelSpec, Statement, What};
use super::stop::StopLatch;
use crate::cnf::NORMAL_FETCH_SIZE;
use crate::ctx::Context;
use crate::err::Error;
use crate::expr::Value;
use crate::key::{advance_past, table_range, Id, Thing};
use crate::kvs::Transaction;
use anyhow::{bail, Result};
use std::collections::HashSet;
use tracing::{trace, warn};

/// Logging target for this module, so operators can filter iterator events
/// independently of the rest of the crate.
const TARGET: &str = "graphdoc::core::dbs";

/// Runs one statement to completion against a transaction. Constructed
/// fresh per statement rather than drawn from a free-list — pooling is an
/// optional optimization this crate doesn't implement; see DESIGN.md.
pub struct Iterator<'a> {
	tx: &'a dyn Transaction,
	eval: &'a dyn Evaluator,
	opts: Options,
	stmt: Statement,
	is_virtual: bool,
	stop: StopLatch,
	result: Vec<Value>,
	error: Option<anyhow::Error>,
	/// Tables already run through `process_perms` this execution, so
	/// multi-table drivers (Batch/SubqueryOther/SubqueryQuery/InlineArray)
	/// check each backing table only once rather than once per record.
	checked_tables: HashSet<String>,
	/// Whether the no-table (`tb == None`) permissions check has already
	/// run this execution, for subquery items with no backing table.
	checked_no_table: bool,
	limit: Option<i64>,
	start: Option<i64>,
	version: u64,
}

impl<'a> Iterator<'a> {
	pub fn new(
		tx: &'a dyn Transaction,
		eval: &'a dyn Evaluator,
		opts: Options,
		stmt: Statement,
		is_virtual: bool,
	) -> Self {
		Self {
			tx,
			eval,
			opts,
			stmt,
			is_virtual,
			stop: StopLatch::new(),
			result: Vec::new(),
			error: None,
			checked_tables: HashSet::new(),
			checked_no_table: false,
			limit: None,
			start: None,
			version: u64::MAX,
		}
	}

	fn check(&self, ctx: &Context) -> bool {
		!self.stop.is_raised() && !ctx.is_done()
	}

	/// Runs the statement to completion and returns the final record
	/// sequence. Consumes `self`: an iterator is single-use, so there's no
	/// separate `close()` call needed since nothing is pooled.
	pub async fn output(mut self, ctx: &Context) -> Result<Vec<Value>> {
		if let Err(e) = self.setup().await {
			warn!(target: TARGET, error = %e, "iterator setup failed");
			self.error = Some(e);
			self.stop.raise();
		}

		if self.error.is_none() {
			let whats = self.stmt.what();
			trace!(target: TARGET, sources = whats.len(), "dispatching source drivers");
			for what in whats {
				if !self.check(ctx) {
					break;
				}
				if let Err(e) = self.run_source(ctx, &what).await {
					warn!(target: TARGET, error = %e, "source driver failed, stopping iteration");
					self.error = Some(e);
					self.stop.raise();
				}
			}
		}

		if let Some(e) = self.error {
			return Err(e);
		}

		let mut docs = std::mem::take(&mut self.result);
		if let Some(paths) = self.stmt.split() {
			docs = apply_split(docs, paths);
		}
		if let Some(group_exprs) = self.stmt.group() {
			let fields = self.stmt.expr().cloned().unwrap_or(Fields::All);
			docs = apply_group(docs, group_exprs, &fields, self.eval)?;
		}
		if let Some(order_keys) = self.stmt.order() {
			docs = apply_order(docs, order_keys, self.eval);
		}
		docs = apply_window(docs, self.start, self.limit);
		Ok(docs)
	}

	/// Projects LIMIT/START/VERSION from the statement.
	/// Defaults: `limit=None`/`start=None` (unbounded), `version=MAX`.
	async fn setup(&mut self) -> Result<()> {
		self.limit = match self.stmt.limit_expr() {
			Some(e) => Some(self.eval.fetch_scalar(ScalarKind::Limit, e).await?),
			None => None,
		};
		self.start = match self.stmt.start_expr() {
			Some(e) => Some(self.eval.fetch_scalar(ScalarKind::Start, e).await?),
			None => None,
		};
		self.version = match self.stmt.version_expr() {
			Some(e) => self.eval.fetch_scalar(ScalarKind::Version, e).await?.try_into().unwrap_or(u64::MAX),
			None => u64::MAX,
		};
		Ok(())
	}

	/// Runs `process_perms` for `tb` at most once per statement execution,
	/// generalized across drivers that touch more than one record of the
	/// same table.
	async fn ensure_perm(&mut self, tb: &str) -> Result<()> {
		if self.checked_tables.contains(tb) {
			return Ok(());
		}
		trace!(target: TARGET, tb, "checking permissions");
		process_perms(self.tx, &self.opts, &self.stmt, Some(tb), self.is_virtual, self.eval).await?;
		self.checked_tables.insert(tb.to_string());
		Ok(())
	}

	/// Runs the permissions gate with `tb: None`, for subquery items with no
	/// single backing table. Privileged auth is a no-op either way; scoped
	/// auth always rejects, since there's no table to check a policy
	/// against.
	async fn ensure_perm_for_subquery(&mut self) -> Result<()> {
		if self.checked_no_table {
			return Ok(());
		}
		trace!(target: TARGET, "checking permissions for tableless subquery source");
		process_perms(self.tx, &self.opts, &self.stmt, None, self.is_virtual, self.eval).await?;
		self.checked_no_table = true;
		Ok(())
	}

	async fn run_source(&mut self, ctx: &Context, what: &What) -> Result<()> {
		match what {
			What::Thing(thing) => {
				self.ensure_perm(&thing.tb).await?;
				if self.check(ctx) {
					self.process(Some(thing), None, None).await?;
				}
			}
			What::Table(tb) => {
				self.ensure_perm(tb).await?;
				self.run_table_scan(ctx, tb).await?;
			}
			What::Batch(things) => {
				for thing in things {
					self.ensure_perm(&thing.tb).await?;
					if !self.check(ctx) {
						break;
					}
					self.process(Some(thing), None, None).await?;
				}
			}
			What::Model(spec) => {
				self.ensure_perm(&spec.table).await?;
				self.run_model(ctx, spec).await?;
			}
			What::SubqueryOther(items) => {
				for item in items {
					if !self.check(ctx) {
						break;
					}
					self.run_subquery_other(item).await?;
				}
			}
			What::SubqueryQuery(items) => {
				for item in items {
					if !self.check(ctx) {
						break;
					}
					self.run_subquery_query(item).await?;
				}
			}
			What::InlineArray(tb, items) => {
				self.ensure_perm(tb).await?;
				for item in items {
					if !self.check(ctx) {
						break;
					}
					self.run_inline_array(tb, item).await?;
				}
			}
		}
		Ok(())
	}

	/// Table range scan, paging at [`NORMAL_FETCH_SIZE`].
	async fn run_table_scan(&mut self, ctx: &Context, tb: &str) -> Result<()> {
		let (min, max) = table_range(&self.opts.ns, &self.opts.db, tb);
		let mut cursor = min;
		loop {
			if !self.check(ctx) {
				break;
			}
			let page = self
				.tx
				.get_range(&self.opts.ns, &self.opts.db, &cursor, &max, self.version, NORMAL_FETCH_SIZE)
				.await?;
			let page_len = page.len();
			trace!(target: TARGET, tb, page_len, "table scan page fetched");
			let last_key = page.last().map(|e| e.key.clone());
			for entry in page {
				if !self.check(ctx) {
					break;
				}
				self.process(None, Some(entry.val), None).await?;
			}
			if page_len < NORMAL_FETCH_SIZE as usize {
				break;
			}
			let Some(last_key) = last_key else {
				break;
			};
			cursor = advance_past(&last_key);
		}
		Ok(())
	}

	/// The |tb:min..max step inc| generator.
	async fn run_model(&mut self, ctx: &Context, spec: &ModelSpec) -> Result<()> {
		if spec.inc == 0.0 {
			if spec.min != spec.max {
				bail!(Error::InvalidModelRange);
			}
			let count = spec.max as i64;
			for _ in 0..count {
				if !self.check(ctx) {
					break;
				}
				let id = Id::String(uuid::Uuid::new_v4().to_string());
				let thing = Thing::new(self.opts.ns.as_str(), self.opts.db.as_str(), spec.table.as_str(), id);
				self.process(Some(&thing), None, None).await?;
			}
			return Ok(());
		}

		let places = decimal_places(spec.inc);
		let scale = 10f64.powi(places as i32);
		let round = |v: f64| (v * scale).round() / scale;

		let mut v = spec.min;
		if spec.min < spec.max {
			while v <= spec.max + f64::EPSILON {
				if !self.check(ctx) {
					break;
				}
				self.emit_model_value(&spec.table, v).await?;
				v = round(v + spec.inc.abs());
			}
		} else {
			while v >= spec.max - f64::EPSILON {
				if !self.check(ctx) {
					break;
				}
				self.emit_model_value(&spec.table, v).await?;
				v = round(v - spec.inc.abs());
			}
		}
		Ok(())
	}

	async fn emit_model_value(&mut self, table: &str, v: f64) -> Result<()> {
		let id = if v.fract() == 0.0 { Id::Number(v as i64) } else { Id::Float(v) };
		let thing = Thing::new(self.opts.ns.as_str(), self.opts.db.as_str(), table, id);
		self.process(Some(&thing), None, None).await
	}

	/// Mutating/RELATE subquery input.
	async fn run_subquery_other(&mut self, item: &Value) -> Result<()> {
		let thing = resolve_mutating_target(&self.opts.ns, &self.opts.db, item)?;
		self.ensure_perm(&thing.tb).await?;
		let overlay = match item {
			Value::Object(_) => Some(item.clone()),
			_ => None,
		};
		self.process(Some(&thing), None, overlay).await
	}

	/// Read-path subquery input.
	async fn run_subquery_query(&mut self, item: &Value) -> Result<()> {
		match item {
			Value::Thing(t) => {
				self.ensure_perm(&t.tb).await?;
				let stored = self.tx.get_thing(t, self.version).await?;
				self.process(Some(t), stored, None).await
			}
			other => {
				self.ensure_perm_for_subquery().await?;
				self.process(None, None, Some(other.clone())).await
			}
		}
	}

	/// Create/Insert/Upsert payload.
	async fn run_inline_array(&mut self, tb: &str, item: &Value) -> Result<()> {
		let (thing, overlay) = match item {
			Value::Thing(t) => (Thing::new(self.opts.ns.as_str(), self.opts.db.as_str(), tb, t.id.clone()), None),
			Value::Object(obj) => match obj.get("id") {
				Some(Value::Thing(t)) => {
					(Thing::new(self.opts.ns.as_str(), self.opts.db.as_str(), tb, t.id.clone()), Some(item.clone()))
				}
				Some(Value::Strand(raw)) => {
					let id = match Thing::parse(&self.opts.ns, &self.opts.db, raw) {
						Some(parsed) => parsed,
						None => Thing::new(self.opts.ns.as_str(), self.opts.db.as_str(), tb, Id::String(raw.clone())),
					};
					(id, Some(item.clone()))
				}
				Some(_) | None => {
					let id = Id::String(uuid::Uuid::new_v4().to_string());
					(Thing::new(self.opts.ns.as_str(), self.opts.db.as_str(), tb, id), Some(item.clone()))
				}
			},
			other => bail!(Error::InvalidStatementTarget { value: other.to_string() }),
		};
		self.process(Some(&thing), None, overlay).await
	}

	/// Per-record processing and early stop. Fetches the stored
	/// value by key when a driver didn't already supply one (Thing/Batch/
	/// generated sources), so the document processor always sees the
	/// merged view of storage + overlay.
	async fn process(&mut self, key: Option<&Thing>, stored: Option<Value>, overlay: Option<Value>) -> Result<()> {
		let stored = match stored {
			Some(v) => Some(v),
			None => match key {
				Some(k) => self.tx.get_thing(k, self.version).await?,
				None => None,
			},
		};

		match crate::doc::process(self.tx, self.eval, &self.stmt, key, stored, overlay).await? {
			Some(value) => {
				self.result.push(value);
				self.maybe_stop_on_limit();
			}
			None => {}
		}
		Ok(())
	}

	/// Early-stop policy: only short-circuits a Select with
	/// neither GROUP nor ORDER configured, since both require reading every
	/// candidate record first.
	fn maybe_stop_on_limit(&mut self) {
		if !self.stmt.is_select() {
			return;
		}
		if self.stmt.group().is_some() || self.stmt.order().is_some() {
			return;
		}
		let Some(limit) = self.limit else {
			return;
		};
		let target = limit + self.start.unwrap_or(0).max(0);
		if self.result.len() as i64 >= target {
			self.stop.raise();
		}
	}
}

/// Resolves a mutating/RELATE subquery item to its target key: a bare
/// `Thing`, or an object carrying an `id` that is
/// itself a `Thing` or a string that parses as one. Any other shape is a
/// fatal shape error, per the Open Question resolution in DESIGN.md
/// (Relate/Update/Delete require a parseable Thing; unlike InlineArray,
/// there is no raw-id fallback here).
fn resolve_mutating_target(ns: &str, db: &str, item: &Value) -> Result<Thing> {
	match item {
		Value::Thing(t) => Ok(t.clone()),
		Value::Object(obj) => match obj.get("id") {
			Some(Value::Thing(t)) => Ok(t.clone()),
			Some(Value::Strand(raw)) => {
				Thing::parse(ns, db, raw).ok_or_else(|| Error::InvalidStatementTarget { value: raw.clone() }.into())
			}
			Some(other) => bail!(Error::InvalidStatementTarget { value: other.to_string() }),
			None => bail!(Error::InvalidStatementTarget { value: item.to_string() }),
		},
		other => bail!(Error::InvalidStatementTarget { value: other.to_string() }),
	}
}

/// Number of significant decimal places in `inc`, used to round a Model
/// generator's running value and avoid floating-point drift.
fn decimal_places(inc: f64) -> u32 {
	let s = format!("{inc}");
	match s.split_once('.') {
		Some((_, frac)) => frac.trim_end_matches('0').len() as u32,
		None => 0,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dbs::eval::DefaultEvaluator;
	use crate::dbs::options::AuthLevel;
	use crate::dbs::statement::{Field, OrderKey, SelectStatement};
	use crate::expr::{Expr, Object};
	use crate::kvs::mem::MemTransaction;

	async fn seed_users(tx: &MemTransaction, ns: &str, db: &str, ages: &[i64]) {
		for (i, age) in ages.iter().enumerate() {
			let mut o = Object::new();
			o.insert("age".into(), Value::from(*age));
			let thing = Thing::new(ns, db, "users", Id::Number(i as i64));
			tx.put_thing(&thing, Value::Object(o)).await.unwrap();
		}
	}

	fn ctx() -> Context {
		Context::background()
	}

	#[tokio::test]
	async fn select_with_limit_stops_early_over_a_large_table() {
		let tx = MemTransaction::new();
		seed_users(&tx, "ns", "db", &(0..100).collect::<Vec<_>>()).await;
		let mut stmt = SelectStatement::new(vec![What::Table("users".into())]);
		stmt.limit = Some(Expr::int(3));
		let eval = DefaultEvaluator;
		let opts = Options::new(AuthLevel::Db, "ns", "db");
		let it = Iterator::new(&tx, &eval, opts, Statement::Select(stmt), false);
		let out = it.output(&ctx()).await.unwrap();
		assert_eq!(out.len(), 3);
	}

	#[tokio::test]
	async fn group_by_age_counts_match_distinct_ages_and_total_rows() {
		let tx = MemTransaction::new();
		seed_users(&tx, "ns", "db", &[30, 30, 40, 20]).await;
		let mut stmt = SelectStatement::new(vec![What::Table("users".into())]);
		stmt.expr = Fields::Select(vec![
			Field::new(Expr::field("age"), "age"),
			Field::new(Expr::Function { name: "count".into(), args: vec![], aggregate: true }, "total"),
		]);
		stmt.group = Some(vec![Expr::field("age")]);
		let eval = DefaultEvaluator;
		let opts = Options::new(AuthLevel::Db, "ns", "db");
		let it = Iterator::new(&tx, &eval, opts, Statement::Select(stmt), false);
		let out = it.output(&ctx()).await.unwrap();
		assert_eq!(out.len(), 3);
		let total: i64 = out
			.iter()
			.map(|d| match d.as_object().unwrap().get("total").unwrap() {
				Value::Number(n) => n.as_f64() as i64,
				_ => 0,
			})
			.sum();
		assert_eq!(total, 4);
	}

	#[tokio::test]
	async fn order_desc_with_limit_and_start_matches_the_worked_example() {
		let tx = MemTransaction::new();
		seed_users(&tx, "ns", "db", &[10, 30, 20, 40]).await;
		let mut stmt = SelectStatement::new(vec![What::Table("users".into())]);
		stmt.order = Some(vec![OrderKey { expr: Expr::field("age"), asc: false }]);
		stmt.limit = Some(Expr::int(2));
		stmt.start = Some(Expr::int(1));
		let eval = DefaultEvaluator;
		let opts = Options::new(AuthLevel::Db, "ns", "db");
		let it = Iterator::new(&tx, &eval, opts, Statement::Select(stmt), false);
		let out = it.output(&ctx()).await.unwrap();
		let ages: Vec<i64> = out
			.iter()
			.map(|d| match d.as_object().unwrap().get("age").unwrap() {
				Value::Number(n) => n.as_f64() as i64,
				_ => 0,
			})
			.collect();
		assert_eq!(ages, vec![30, 20]);
	}

	#[tokio::test]
	async fn locked_view_table_rejects_mutating_statements() {
		use crate::dbs::statement::MutateStatement;
		use crate::kvs::TableDef;

		let tx = MemTransaction::new();
		let mut view = TableDef::new("view_tbl");
		view.lock = true;
		tx.define_table("ns", "db", view);

		let stmt = Statement::Create(MutateStatement {
			what: vec![What::InlineArray("view_tbl".into(), vec![Value::Object(Object::new())])],
			cond: None,
		});
		let eval = DefaultEvaluator;
		let opts = Options::new(AuthLevel::Db, "ns", "db");
		let it = Iterator::new(&tx, &eval, opts, stmt, false);
		let err = it.output(&ctx()).await.unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::TableIsView { .. })));
	}

	#[tokio::test]
	async fn model_count_generator_produces_distinct_ids() {
		let spec = ModelSpec::count("gen", 5);
		let stmt = SelectStatement::new(vec![What::Model(spec)]);
		let tx = MemTransaction::new();
		let eval = DefaultEvaluator;
		let opts = Options::new(AuthLevel::Db, "ns", "db");
		let it = Iterator::new(&tx, &eval, opts, Statement::Select(stmt), false);
		let out = it.output(&ctx()).await.unwrap();
		assert_eq!(out.len(), 5);
	}

	#[tokio::test]
	async fn model_step_range_produces_the_expected_sequence() {
		let spec = ModelSpec::range("n", 1.0, 3.0, 0.5);
		let stmt = SelectStatement::new(vec![What::Model(spec)]);
		let tx = MemTransaction::new();
		let eval = DefaultEvaluator;
		let opts = Options::new(AuthLevel::Db, "ns", "db");
		let it = Iterator::new(&tx, &eval, opts, Statement::Select(stmt), false);
		let out = it.output(&ctx()).await.unwrap();
		assert_eq!(out.len(), 5);
	}

	#[tokio::test]
	async fn model_zero_inc_with_mismatched_min_max_is_rejected() {
		let spec = ModelSpec::range("n", 1.0, 3.0, 0.0);
		let stmt = SelectStatement::new(vec![What::Model(spec)]);
		let tx = MemTransaction::new();
		let eval = DefaultEvaluator;
		let opts = Options::new(AuthLevel::Db, "ns", "db");
		let it = Iterator::new(&tx, &eval, opts, Statement::Select(stmt), false);
		let err = it.output(&ctx()).await.unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidModelRange)));
	}

	#[tokio::test]
	async fn batch_source_processes_every_listed_thing() {
		let tx = MemTransaction::new();
		seed_users(&tx, "ns", "db", &[10, 20, 30]).await;
		let things = vec![
			Thing::new("ns", "db", "users", Id::Number(0)),
			Thing::new("ns", "db", "users", Id::Number(2)),
		];
		let stmt = SelectStatement::new(vec![What::Batch(things)]);
		let eval = DefaultEvaluator;
		let opts = Options::new(AuthLevel::Db, "ns", "db");
		let it = Iterator::new(&tx, &eval, opts, Statement::Select(stmt), false);
		let out = it.output(&ctx()).await.unwrap();
		assert_eq!(out.len(), 2);
	}

	#[tokio::test]
	async fn subquery_other_creates_records_from_object_and_strand_ids() {
		use crate::dbs::statement::MutateStatement;

		let tx = MemTransaction::new();
		let items = vec![
			{
				let mut o = Object::new();
				o.insert("id".into(), Value::from("users:5"));
				o.insert("age".into(), Value::from(50i64));
				Value::Object(o)
			},
			Value::Thing(Thing::new("ns", "db", "users", Id::Number(6))),
		];
		let stmt = Statement::Create(MutateStatement { what: vec![What::SubqueryOther(items)], cond: None });
		let eval = DefaultEvaluator;
		let opts = Options::new(AuthLevel::Db, "ns", "db");
		let it = Iterator::new(&tx, &eval, opts, stmt, false);
		let out = it.output(&ctx()).await.unwrap();
		assert_eq!(out.len(), 2);
		let stored = tx.get_thing(&Thing::new("ns", "db", "users", Id::Number(5)), u64::MAX).await.unwrap();
		assert!(stored.is_some());
	}

	#[tokio::test]
	async fn subquery_query_reads_stored_things_and_passes_through_inline_values() {
		let tx = MemTransaction::new();
		seed_users(&tx, "ns", "db", &[30]).await;
		let items = vec![
			Value::Thing(Thing::new("ns", "db", "users", Id::Number(0))),
			Value::from("not a thing"),
		];
		let stmt = SelectStatement::new(vec![What::SubqueryQuery(items)]);
		let eval = DefaultEvaluator;
		let opts = Options::new(AuthLevel::Db, "ns", "db");
		let it = Iterator::new(&tx, &eval, opts, Statement::Select(stmt), false);
		let out = it.output(&ctx()).await.unwrap();
		assert_eq!(out.len(), 2);
	}

	#[tokio::test]
	async fn scoped_auth_rejects_a_tableless_subquery_query_item() {
		let tx = MemTransaction::new();
		let items = vec![Value::from("not a thing")];
		let stmt = SelectStatement::new(vec![What::SubqueryQuery(items)]);
		let eval = DefaultEvaluator;
		let opts = Options::new(AuthLevel::Scope, "ns", "db");
		let it = Iterator::new(&tx, &eval, opts, Statement::Select(stmt), false);
		let err = it.output(&ctx()).await.unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidStatementTarget { .. })));
	}

	#[tokio::test]
	async fn virtual_flag_bypasses_the_view_lock_for_mutating_statements() {
		use crate::dbs::statement::MutateStatement;
		use crate::kvs::TableDef;

		let tx = MemTransaction::new();
		let mut view = TableDef::new("view_tbl");
		view.lock = true;
		tx.define_table("ns", "db", view);

		let stmt = Statement::Create(MutateStatement {
			what: vec![What::InlineArray("view_tbl".into(), vec![Value::Object(Object::new())])],
			cond: None,
		});
		let eval = DefaultEvaluator;
		let opts = Options::new(AuthLevel::Db, "ns", "db");
		let it = Iterator::new(&tx, &eval, opts, stmt, true);
		let out = it.output(&ctx()).await.unwrap();
		assert_eq!(out.len(), 1);
	}
}
