//! The transaction layer: the external key/value collaborator the iterator
//! drives through a narrow trait, plus an in-memory reference implementation
//! (`mem`) so the whole pipeline is exercisable without a real storage
//! engine.

pub mod mem;

use crate::err::Error;
use crate::expr::{Expr, Value};
use crate::key::Thing;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A table's permission policy, one expression per statement kind slot.
/// `None` (absent from [`TableDef::permissions`]) means the table's
/// permissions are not a structured expression object at all — an opaque,
/// closed policy that always denies scoped access.
#[derive(Clone, Debug)]
pub struct PermSpec {
	pub select: Expr,
	pub create: Expr,
	pub update: Expr,
	pub delete: Expr,
}

impl PermSpec {
	/// A permission policy that allows everything, for tables that don't
	/// restrict scoped access.
	pub fn full() -> Self {
		let allow = Expr::Literal(Value::Bool(true));
		Self {
			select: allow.clone(),
			create: allow.clone(),
			update: allow.clone(),
			delete: allow,
		}
	}

	/// A permission policy that denies everything.
	pub fn none() -> Self {
		let deny = Expr::Literal(Value::Bool(false));
		Self {
			select: deny.clone(),
			create: deny.clone(),
			update: deny.clone(),
			delete: deny,
		}
	}
}

/// A statement's effect, used to route into the matching [`PermSpec`] slot:
/// Select→select, Create/Insert/Relate→create, Update/Upsert→update,
/// Delete→delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermSlot {
	Select,
	Create,
	Update,
	Delete,
}

#[derive(Clone, Debug)]
pub struct TableDef {
	pub name: String,
	/// The view-lock sentinel: direct mutation is forbidden unless the
	/// iterator is running on behalf of a view refresh (`virtual == true`).
	pub lock: bool,
	/// `None` means the table's permissions are not a structured
	/// expression object — an opaque, closed policy.
	pub permissions: Option<PermSpec>,
}

impl TableDef {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			lock: false,
			permissions: Some(PermSpec::full()),
		}
	}

	pub fn permission_for(&self, slot: PermSlot) -> Result<&Expr> {
		let perms = self
			.permissions
			.as_ref()
			.ok_or_else(|| Error::InvalidPermissions { table: self.name.clone() })?;
		Ok(match slot {
			PermSlot::Select => &perms.select,
			PermSlot::Create => &perms.create,
			PermSlot::Update => &perms.update,
			PermSlot::Delete => &perms.delete,
		})
	}
}

/// A single range-scan page entry.
pub struct Entry {
	pub key: Vec<u8>,
	pub val: Value,
}

/// The narrow transaction seam the iterator calls through, standing in for
/// `Tx.GetNS/GetDB/GetTB/AddTB/GetR`. `get_thing`/`put_thing` are an
/// addition: the document processor needs somewhere to read/write single
/// records so round-trip scenarios are actually exercisable end to end.
#[async_trait]
pub trait Transaction: Send + Sync {
	async fn get_ns(&self, ns: &str) -> Result<()>;
	async fn get_db(&self, ns: &str, db: &str) -> Result<()>;
	async fn get_tb(&self, ns: &str, db: &str, tb: &str) -> Result<Arc<TableDef>>;
	/// Create-if-missing lookup.
	async fn add_tb(&self, ns: &str, db: &str, tb: &str) -> Result<Arc<TableDef>>;

	/// A versioned range scan over `[min, max)`, returning at most `limit`
	/// entries in key order.
	async fn get_range(
		&self,
		ns: &str,
		db: &str,
		min: &[u8],
		max: &[u8],
		version: u64,
		limit: u32,
	) -> Result<Vec<Entry>>;

	async fn get_thing(&self, thing: &Thing, version: u64) -> Result<Option<Value>>;
	async fn put_thing(&self, thing: &Thing, value: Value) -> Result<()>;
}
