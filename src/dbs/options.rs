//! Per-execution options: the authentication scope and target
//! namespace/database the permissions gate checks against.

/// Where in the authentication hierarchy the current session sits. `Kv`,
/// `Ns` and `Db` are the "privileged" levels that skip the permission
/// expression entirely; `Scope` is record/row-scoped auth, subject to
/// per-table permission expressions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuthLevel {
	Kv,
	Ns,
	Db,
	Scope,
}

impl AuthLevel {
	/// KV/NS/DB auth levels bypass the permission expression; only `Scope`
	/// auth is checked against the table's policy.
	pub fn is_privileged(&self) -> bool {
		!matches!(self, AuthLevel::Scope)
	}
}

#[derive(Clone, Debug)]
pub struct Options {
	pub auth: AuthLevel,
	pub ns: String,
	pub db: String,
}

impl Options {
	pub fn new(auth: AuthLevel, ns: impl Into<String>, db: impl Into<String>) -> Self {
		Self { auth, ns: ns.into(), db: db.into() }
	}
}
