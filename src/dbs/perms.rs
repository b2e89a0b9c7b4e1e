//! The permissions gate, invoked once per source ahead of any per-record
//! work.

use super::eval::Evaluator;
use super::options::Options;
use super::statement::Statement;
use crate::err::Error;
use crate::kvs::Transaction;
use anyhow::{bail, Result};

/// Runs the permissions gate for one source against `(ns, db, tb)`.
/// `tb == None` marks a subquery/generated source with no single backing
/// table.
pub async fn process_perms(
	tx: &dyn Transaction,
	opts: &Options,
	stmt: &Statement,
	tb: Option<&str>,
	is_virtual: bool,
	eval: &dyn Evaluator,
) -> Result<()> {
	if opts.auth.is_privileged() {
		let Some(tb) = tb else {
			return Ok(());
		};
		if stmt.is_select() {
			return Ok(());
		}
		let def = tx.add_tb(&opts.ns, &opts.db, tb).await?;
		if def.lock && !is_virtual && stmt.is_mutating() {
			bail!(Error::TableIsView { table: tb.to_string() });
		}
		return Ok(());
	}

	let Some(tb) = tb else {
		bail!(Error::InvalidStatementTarget { value: "subquery under scoped authentication".into() });
	};
	tx.get_ns(&opts.ns).await?;
	tx.get_db(&opts.ns, &opts.db).await?;
	let def = tx.get_tb(&opts.ns, &opts.db, tb).await?;

	if def.lock && !is_virtual && stmt.is_mutating() {
		bail!(Error::TableIsView { table: tb.to_string() });
	}

	let expr = def.permission_for(stmt.perm_slot())?;
	if !eval.fetch_perm(expr).await? {
		bail!(Error::InvalidPermissions { table: tb.to_string() });
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dbs::eval::DefaultEvaluator;
	use crate::dbs::options::AuthLevel;
	use crate::dbs::statement::{MutateStatement, SelectStatement, Statement, What};
	use crate::kvs::mem::MemTransaction;
	use crate::kvs::{PermSpec, TableDef};

	#[tokio::test]
	async fn privileged_auth_creates_missing_table_and_enforces_lock() {
		let tx = MemTransaction::new();
		let opts = Options::new(AuthLevel::Db, "ns", "db");
		let eval = DefaultEvaluator;
		let stmt = Statement::Create(MutateStatement { what: vec![], cond: None });

		process_perms(&tx, &opts, &stmt, Some("users"), false, &eval).await.unwrap();
		tx.get_tb("ns", "db", "users").await.unwrap();

		let mut locked = TableDef::new("locked");
		locked.lock = true;
		tx.define_table("ns", "db", locked);
		let err = process_perms(&tx, &opts, &stmt, Some("locked"), false, &eval).await.unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::TableIsView { .. })));
	}

	#[tokio::test]
	async fn scoped_auth_denies_on_false_permission_expression() {
		let tx = MemTransaction::new();
		let mut restricted = TableDef::new("secrets");
		restricted.permissions = Some(PermSpec::none());
		tx.define_table("ns", "db", restricted);

		let opts = Options::new(AuthLevel::Scope, "ns", "db");
		let eval = DefaultEvaluator;
		let stmt = Statement::Select(SelectStatement::new(vec![What::Table("secrets".into())]));
		let err = process_perms(&tx, &opts, &stmt, Some("secrets"), false, &eval).await.unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidPermissions { .. })));
	}

	#[tokio::test]
	async fn scoped_auth_under_subquery_with_no_table_is_rejected() {
		let tx = MemTransaction::new();
		let opts = Options::new(AuthLevel::Scope, "ns", "db");
		let eval = DefaultEvaluator;
		let stmt = Statement::Select(SelectStatement::new(vec![]));
		assert!(process_perms(&tx, &opts, &stmt, None, false, &eval).await.is_err());
	}
}
