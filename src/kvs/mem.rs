//! An in-memory [`Transaction`] implementation: a `BTreeMap` keeps entries
//! in key order so
//! range scans come back pre-sorted for free, and each key keeps every
//! version ever written so `GetR` can serve point-in-time reads.

use super::{Entry, TableDef, Transaction};
use crate::err::Error;
use crate::expr::Value;
use crate::key::Thing;
use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Store {
	namespaces: HashSet<String>,
	databases: HashSet<(String, String)>,
	tables: HashMap<(String, String, String), Arc<TableDef>>,
	/// Every version ever written to a key, oldest first.
	data: BTreeMap<Vec<u8>, Vec<(u64, Value)>>,
}

pub struct MemTransaction {
	store: RwLock<Store>,
	next_version: AtomicU64,
}

impl Default for MemTransaction {
	fn default() -> Self {
		Self::new()
	}
}

impl MemTransaction {
	pub fn new() -> Self {
		Self {
			store: RwLock::new(Store::default()),
			next_version: AtomicU64::new(1),
		}
	}

	/// Registers a namespace/database/table ahead of time, e.g. to mark a
	/// table as view-locked or to install a restrictive permission policy
	/// before running a statement against it.
	pub fn define_table(&self, ns: &str, db: &str, table: TableDef) {
		let mut store = self.store.write();
		store.namespaces.insert(ns.to_string());
		store.databases.insert((ns.to_string(), db.to_string()));
		store.tables.insert((ns.to_string(), db.to_string(), table.name.clone()), Arc::new(table));
	}

	pub fn next_version(&self) -> u64 {
		self.next_version.fetch_add(1, Ordering::SeqCst)
	}
}

#[async_trait]
impl Transaction for MemTransaction {
	async fn get_ns(&self, ns: &str) -> Result<()> {
		if self.store.read().namespaces.contains(ns) {
			Ok(())
		} else {
			bail!(Error::NsNotFound { ns: ns.to_string() })
		}
	}

	async fn get_db(&self, ns: &str, db: &str) -> Result<()> {
		self.get_ns(ns).await?;
		if self.store.read().databases.contains(&(ns.to_string(), db.to_string())) {
			Ok(())
		} else {
			bail!(Error::DbNotFound { db: db.to_string() })
		}
	}

	async fn get_tb(&self, ns: &str, db: &str, tb: &str) -> Result<Arc<TableDef>> {
		self.get_db(ns, db).await?;
		let key = (ns.to_string(), db.to_string(), tb.to_string());
		match self.store.read().tables.get(&key) {
			Some(t) => Ok(t.clone()),
			None => bail!(Error::TbNotFound { tb: tb.to_string() }),
		}
	}

	async fn add_tb(&self, ns: &str, db: &str, tb: &str) -> Result<Arc<TableDef>> {
		let key = (ns.to_string(), db.to_string(), tb.to_string());
		{
			let store = self.store.read();
			if let Some(t) = store.tables.get(&key) {
				return Ok(t.clone());
			}
		}
		let mut store = self.store.write();
		store.namespaces.insert(ns.to_string());
		store.databases.insert((ns.to_string(), db.to_string()));
		let def = store
			.tables
			.entry(key)
			.or_insert_with(|| Arc::new(TableDef::new(tb)))
			.clone();
		Ok(def)
	}

	async fn get_range(
		&self,
		_ns: &str,
		_db: &str,
		min: &[u8],
		max: &[u8],
		version: u64,
		limit: u32,
	) -> Result<Vec<Entry>> {
		let store = self.store.read();
		let mut out = Vec::new();
		for (key, versions) in store.data.range(min.to_vec()..max.to_vec()) {
			if out.len() as u32 >= limit {
				break;
			}
			if let Some((_, val)) = versions.iter().rev().find(|(v, _)| *v <= version) {
				out.push(Entry { key: key.clone(), val: val.clone() });
			}
		}
		Ok(out)
	}

	async fn get_thing(&self, thing: &Thing, version: u64) -> Result<Option<Value>> {
		let key = thing.encode();
		let store = self.store.read();
		Ok(store
			.data
			.get(&key)
			.and_then(|versions| versions.iter().rev().find(|(v, _)| *v <= version))
			.map(|(_, val)| val.clone()))
	}

	async fn put_thing(&self, thing: &Thing, value: Value) -> Result<()> {
		let version = self.next_version();
		let key = thing.encode();
		let mut store = self.store.write();
		store.data.entry(key).or_default().push((version, value));
		Ok(())
	}
}
