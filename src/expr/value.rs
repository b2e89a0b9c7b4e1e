use super::part::Part;
use crate::key::Thing;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A number, kept as a closed two-variant sum (rather than pulling in an
/// arbitrary-precision decimal type, which this narrowed value algebra has no
/// use for) so it can implement a total order for GROUP bucket keys and
/// ORDER comparisons.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub enum Number {
	Int(i64),
	Float(f64),
}

impl PartialEq for Number {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}
impl Eq for Number {}

impl PartialOrd for Number {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Number {
	fn cmp(&self, other: &Self) -> Ordering {
		match (self, other) {
			(Number::Int(a), Number::Int(b)) => a.cmp(b),
			(Number::Float(a), Number::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
			(Number::Int(a), Number::Float(b)) => (*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal),
			(Number::Float(a), Number::Int(b)) => a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal),
		}
	}
}

impl Number {
	pub fn as_f64(&self) -> f64 {
		match self {
			Number::Int(v) => *v as f64,
			Number::Float(v) => *v,
		}
	}
}

impl std::fmt::Display for Number {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Number::Int(v) => write!(f, "{v}"),
			Number::Float(v) => write!(f, "{v}"),
		}
	}
}

pub type Array = Vec<Value>;
/// Objects keep field order insignificant but deterministic (`BTreeMap`)
/// which makes the canonical group-key rendering in [`crate::dbs::group`]
/// stable across runs.
pub type Object = BTreeMap<String, Value>;

/// The document value algebra, deliberately narrow: no geometry, datetime,
/// duration, decimal, bytes, closures or ranges, just what Select/Split/
/// Group/Order and the function registry need.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
	None,
	Bool(bool),
	Number(Number),
	Strand(String),
	Array(Array),
	Object(Object),
	Thing(Thing),
}

impl Default for Value {
	fn default() -> Self {
		Value::None
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Number(Number::Int(v))
	}
}
impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Number(Number::Float(v))
	}
}
impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::Strand(v.to_string())
	}
}
impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::Strand(v)
	}
}
impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}
impl From<Thing> for Value {
	fn from(v: Thing) -> Self {
		Value::Thing(v)
	}
}

impl Value {
	/// Truthiness used by WHERE/permission predicates: only `true` and a
	/// non-zero number are truthy; everything else (including `None`,
	/// strings and objects) is not.
	pub fn is_truthy(&self) -> bool {
		match self {
			Value::Bool(b) => *b,
			Value::Number(n) => n.as_f64() != 0.0,
			_ => false,
		}
	}

	pub fn as_object(&self) -> Option<&Object> {
		match self {
			Value::Object(o) => Some(o),
			_ => None,
		}
	}

	/// Gets the value at `path`, returning [`Value::None`] for any part of
	/// the path that doesn't resolve. Handles object-field and wildcard
	/// traversal (see `expr::part::Part` doc comment for why array indexing
	/// was dropped).
	pub fn pick(&self, path: &[Part]) -> Value {
		let Some(p) = path.first() else {
			return self.clone();
		};
		let rest = &path[1..];
		match (self, p) {
			(Value::Object(o), Part::Field(f)) => match o.get(f) {
				Some(v) => v.pick(rest),
				None => Value::None,
			},
			(Value::Object(o), Part::All) => {
				Value::Array(o.values().map(|v| v.pick(rest)).collect())
			}
			(Value::Array(a), Part::All) => Value::Array(a.iter().map(|v| v.pick(rest)).collect()),
			(Value::Array(a), _) => Value::Array(a.iter().map(|v| v.pick(path)).collect()),
			_ => Value::None,
		}
	}

	/// Sets the value at `path`, creating intermediate objects as needed.
	/// Used by SPLIT to rewrite the split field on a cloned document.
	pub fn set(&mut self, path: &[Part], val: Value) {
		let Some(p) = path.first() else {
			*self = val;
			return;
		};
		let rest = &path[1..];
		match p {
			Part::Field(f) => {
				if !matches!(self, Value::Object(_)) {
					*self = Value::Object(Object::new());
				}
				if let Value::Object(o) = self {
					let entry = o.entry(f.clone()).or_insert(Value::None);
					entry.set(rest, val);
				}
			}
			Part::All => {
				// Splits never address `*` on the write side; a no-op
				// keeps `set` total without inventing write semantics.
			}
		}
	}

	/// Three-way comparison used by ORDER BY, matching the external `Comp`
	/// collaborator. Variants are totally ordered by a fixed type rank so
	/// that comparing values of different kinds is deterministic rather
	/// than a panic or an arbitrary choice.
	pub fn compare(&self, other: &Self) -> Ordering {
		fn rank(v: &Value) -> u8 {
			match v {
				Value::None => 0,
				Value::Bool(_) => 1,
				Value::Number(_) => 2,
				Value::Strand(_) => 3,
				Value::Array(_) => 4,
				Value::Object(_) => 5,
				Value::Thing(_) => 6,
			}
		}
		match (self, other) {
			(Value::None, Value::None) => Ordering::Equal,
			(Value::Bool(a), Value::Bool(b)) => a.cmp(b),
			(Value::Number(a), Value::Number(b)) => a.cmp(b),
			(Value::Strand(a), Value::Strand(b)) => a.cmp(b),
			(Value::Thing(a), Value::Thing(b)) => a.encode().cmp(&b.encode()),
			(Value::Array(a), Value::Array(b)) => {
				for (x, y) in a.iter().zip(b.iter()) {
					let c = x.compare(y);
					if c != Ordering::Equal {
						return c;
					}
				}
				a.len().cmp(&b.len())
			}
			(Value::Object(a), Value::Object(b)) => {
				for (k, x) in a.iter() {
					match b.get(k) {
						Some(y) => {
							let c = x.compare(y);
							if c != Ordering::Equal {
								return c;
							}
						}
						None => return Ordering::Greater,
					}
				}
				a.len().cmp(&b.len())
			}
			_ => rank(self).cmp(&rank(other)),
		}
	}

	/// Canonical byte rendering used as a GROUP bucket key. Distinct
	/// values whose display forms coincide (the number `1` and the string
	/// `"1"`) still encode to distinct bytes here, because `serde_json`
	/// tags strings with quotes — this is a structural key rather than a
	/// string-rendering shortcut.
	pub fn group_key_bytes(&self) -> Vec<u8> {
		serde_json::to_vec(self).unwrap_or_default()
	}
}

impl std::fmt::Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::None => write!(f, "NONE"),
			Value::Bool(b) => write!(f, "{b}"),
			Value::Number(n) => write!(f, "{n}"),
			Value::Strand(s) => write!(f, "{s}"),
			Value::Array(a) => {
				write!(f, "[")?;
				for (i, v) in a.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{v}")?;
				}
				write!(f, "]")
			}
			Value::Object(o) => {
				write!(f, "{{")?;
				for (i, (k, v)) in o.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{k}: {v}")?;
				}
				write!(f, "}}")
			}
			Value::Thing(t) => write!(f, "{t}"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::expr::part::parse_path;

	#[test]
	fn pick_nested_field() {
		let mut obj = Object::new();
		let mut inner = Object::new();
		inner.insert("city".into(), Value::from("nyc"));
		obj.insert("address".into(), Value::Object(inner));
		let v = Value::Object(obj);
		assert_eq!(v.pick(&parse_path("address.city")), Value::from("nyc"));
		assert_eq!(v.pick(&parse_path("address.zip")), Value::None);
	}

	#[test]
	fn set_creates_intermediate_objects() {
		let mut v = Value::None;
		v.set(&parse_path("tags"), Value::from("x"));
		assert_eq!(v.pick(&parse_path("tags")), Value::from("x"));
	}

	#[test]
	fn group_key_distinguishes_number_and_string() {
		let n = Value::from(1i64).group_key_bytes();
		let s = Value::from("1").group_key_bytes();
		assert_ne!(n, s);
	}

	#[test]
	fn compare_numbers_across_int_and_float() {
		use std::cmp::Ordering;
		assert_eq!(Value::from(1i64).compare(&Value::from(1.0)), Ordering::Equal);
		assert_eq!(Value::from(1i64).compare(&Value::from(2.0)), Ordering::Less);
	}
}
