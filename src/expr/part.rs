//! Path segments used by `pick`/`set`, covering just the object-field and
//! wildcard cases SPLIT and GROUP need (no array index/first/last/graph
//! traversal). See DESIGN.md for why array-index traversal was left out.

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Part {
	Field(String),
	All,
}

impl std::fmt::Display for Part {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Part::Field(name) => write!(f, "{name}"),
			Part::All => write!(f, "*"),
		}
	}
}

/// Parses a dotted field path, e.g. `"address.city"` -> `[Field(address),
/// Field(city)]`. A bare `"*"` segment parses to [`Part::All`].
pub fn parse_path(path: &str) -> Vec<Part> {
	path.split('.')
		.map(|seg| if seg == "*" { Part::All } else { Part::Field(seg.to_string()) })
		.collect()
}
