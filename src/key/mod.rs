//! Storage key encoding.
//!
//! Keys encode to lexicographically ordered byte strings via [`storekey`],
//! narrowed to the one shape this core needs: a record [`Thing`] under a
//! namespace/database/table, plus the `[min, max)` range that brackets
//! every record of a table.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;

/// A key type that serializes to order-preserving bytes via `storekey`.
/// `ValueType` names what this key's entry stores; it plays no part in the
/// encoding, only in documenting what a lookup against this key returns.
pub trait KVKey: Serialize {
	type ValueType;

	fn encode_key(&self) -> anyhow::Result<Vec<u8>> {
		Ok(storekey::serialize(self)?)
	}
}

/// A record identifier. `storekey` encodes each variant to a byte run that
/// preserves its natural ordering, and tags variants by declaration order,
/// so numbers always sort before floats before strings regardless of the
/// particular values involved.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Id {
	Number(i64),
	Float(f64),
	String(String),
}

impl KVKey for Id {
	type ValueType = ();
}

impl PartialEq for Id {
	fn eq(&self, other: &Self) -> bool {
		self.encode() == other.encode()
	}
}
impl Eq for Id {}

impl std::hash::Hash for Id {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.encode().hash(state)
	}
}

impl PartialOrd for Id {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}
impl Ord for Id {
	fn cmp(&self, other: &Self) -> Ordering {
		self.encode().cmp(&other.encode())
	}
}

impl Id {
	/// Encodes this id to its order-preserving storage bytes.
	pub fn encode(&self) -> Vec<u8> {
		self.encode_key().expect("id values always serialize to storekey bytes")
	}
}

impl std::fmt::Display for Id {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Id::Number(n) => write!(f, "{n}"),
			Id::Float(v) => write!(f, "{v}"),
			Id::String(s) => write!(f, "{s}"),
		}
	}
}

/// A fully qualified record identity `(NS, DB, TB, ID)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Thing {
	pub ns: String,
	pub db: String,
	pub tb: String,
	pub id: Id,
}

/// The on-the-wire shape of a `Thing` key: single-byte tags separate each
/// field so the encoded bytes of two things with a common `ns`/`db`/`tb`
/// prefix never falsely collide with a different split of the same bytes.
#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Serialize, Deserialize)]
struct ThingKey<'a> {
	__: u8,
	ns: &'a str,
	_a: u8,
	db: &'a str,
	_b: u8,
	tb: &'a str,
	_c: u8,
	id: Cow<'a, Id>,
}

impl KVKey for ThingKey<'_> {
	type ValueType = Thing;
}

impl<'a> ThingKey<'a> {
	fn new(ns: &'a str, db: &'a str, tb: &'a str, id: &'a Id) -> Self {
		Self { __: b'/', ns, _a: b'*', db, _b: b'*', tb, _c: b'*', id: Cow::Borrowed(id) }
	}
}

/// Byte-tagged prefix shared by every record of `(ns, db, tb)`, with no id
/// field of its own — used only to compute [`table_range`]'s bounds. Its
/// encoding is a strict byte prefix of every [`ThingKey`] sharing the same
/// `ns`/`db`/`tb`, since `storekey` serializes struct fields in sequence
/// with no trailing length or variant marker.
#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Serialize, Deserialize)]
struct TablePrefix<'a> {
	__: u8,
	ns: &'a str,
	_a: u8,
	db: &'a str,
	_b: u8,
	tb: &'a str,
	_c: u8,
}

impl KVKey for TablePrefix<'_> {
	type ValueType = Vec<u8>;
}

impl<'a> TablePrefix<'a> {
	fn new(ns: &'a str, db: &'a str, tb: &'a str) -> Self {
		Self { __: b'/', ns, _a: b'*', db, _b: b'*', tb, _c: b'*' }
	}

	fn encode(&self) -> Vec<u8> {
		self.encode_key().expect("table prefix fields always serialize to storekey bytes")
	}
}

impl Thing {
	pub fn new(ns: impl Into<String>, db: impl Into<String>, tb: impl Into<String>, id: Id) -> Self {
		Self {
			ns: ns.into(),
			db: db.into(),
			tb: tb.into(),
			id,
		}
	}

	/// Encodes this record identity to its storage key bytes.
	pub fn encode(&self) -> Vec<u8> {
		ThingKey::new(&self.ns, &self.db, &self.tb, &self.id)
			.encode_key()
			.expect("thing fields always serialize to storekey bytes")
	}

	/// Attempts to parse a `tb:id` string into a `Thing` scoped to the
	/// given namespace/database. Used by the subquery and inline-array
	/// source drivers, which accept either a structured `Thing` value or
	/// its string form.
	pub fn parse(ns: &str, db: &str, raw: &str) -> Option<Thing> {
		let (tb, id) = raw.split_once(':')?;
		if tb.is_empty() || id.is_empty() {
			return None;
		}
		let id = if let Ok(n) = id.parse::<i64>() {
			Id::Number(n)
		} else {
			Id::String(id.to_string())
		};
		Some(Thing::new(ns, db, tb, id))
	}
}

impl std::fmt::Display for Thing {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.tb, self.id)
	}
}

/// Computes the `[min, max)` byte-string range bracketing every record of
/// `(ns, db, tb)`: the table prefix with a trailing `0x00` as the lower
/// bound, and the same prefix with a trailing `0xff` as the upper bound,
/// mirroring the `prefix_beg`/`prefix_end` convention index keys use.
pub fn table_range(ns: &str, db: &str, tb: &str) -> (Vec<u8>, Vec<u8>) {
	let prefix = TablePrefix::new(ns, db, tb).encode();
	let mut min = prefix.clone();
	min.push(0x00);
	let mut max = prefix;
	max.push(0xff);
	(min, max)
}

/// Advances a range-scan lower bound past `last_key`, by appending a
/// trailing `0x00` byte. Because every encoded id ends in a byte run that
/// is never a bare `0x00` continuation of itself (numbers and floats are
/// fixed-width, strings end in an explicit `0x00` terminator), this never
/// revisits `last_key` and never skips the key that immediately follows it.
pub fn advance_past(last_key: &[u8]) -> Vec<u8> {
	let mut next = last_key.to_vec();
	next.push(0x00);
	next
}
