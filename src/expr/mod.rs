//! The document value algebra and the small expression surface this core
//! evaluates against it.
//!
//! The real expression language (parser, full function catalogue,
//! sub-selects) is an external collaborator out of scope for this crate; what
//! lives here is the narrow seam the iterator, [`crate::doc`] and
//! [`crate::dbs::group`]/[`crate::dbs::order`] need to drive SPLIT/GROUP/ORDER
//! and the field-list projection.

pub mod part;
pub mod value;

pub use part::Part;
pub use value::{Array, Number, Object, Value};


/// An expression that can be evaluated either against a document, or (for
/// LIMIT/START/VERSION and permission predicates) without one.
#[derive(Clone, Debug)]
pub enum Expr {
	Literal(Value),
	/// A field path, e.g. `age` or `address.city`.
	Idiom(Vec<Part>),
	/// A scalar or aggregate function call.
	Function {
		name: String,
		args: Vec<Expr>,
		/// Marks this call as an aggregate; only meaningful inside a GROUP
		/// projection.
		aggregate: bool,
	},
}

impl Expr {
	pub fn field(name: impl Into<String>) -> Self {
		Expr::Idiom(vec![Part::Field(name.into())])
	}

	pub fn int(v: i64) -> Self {
		Expr::Literal(Value::Number(Number::Int(v)))
	}
}

impl std::fmt::Display for Expr {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Expr::Literal(v) => write!(f, "{v}"),
			Expr::Idiom(parts) => {
				for (i, p) in parts.iter().enumerate() {
					if i > 0 {
						write!(f, ".")?;
					}
					write!(f, "{p}")?;
				}
				Ok(())
			}
			Expr::Function { name, args, .. } => {
				write!(f, "{name}(")?;
				for (i, a) in args.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{a}")?;
				}
				write!(f, ")")
			}
		}
	}
}
