use thiserror::Error;

/// Errors produced by the query iteration core.
///
/// Every variant is wrapped in [`anyhow::Result`] at call boundaries via
/// `anyhow::{Result, bail, ensure}` rather than returned bare.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
	#[error("The namespace '{ns}' does not exist")]
	NsNotFound { ns: String },

	#[error("The database '{db}' does not exist")]
	DbNotFound { db: String },

	#[error("The table '{tb}' does not exist")]
	TbNotFound { tb: String },

	#[error("Unable to write to the '{table}' table while it is setup as a view")]
	TableIsView { table: String },

	#[error("You don't have permission to perform this action on the '{table}' table")]
	InvalidPermissions { table: String },

	#[error("Found {value} but expected a valid statement target")]
	InvalidStatementTarget { value: String },

	#[error("Invalid MODEL generator: INC cannot be 0 when MIN != MAX")]
	InvalidModelRange,

	#[error("Invalid LIMIT clause: {0}")]
	InvalidLimit(String),

	#[error("Invalid START clause: {0}")]
	InvalidStart(String),

	#[error("Invalid VERSION clause: {0}")]
	InvalidVersion(String),

	#[error("Field '{0}' referenced inside a permission expression")]
	FieldInPermsExpr(String),

	#[error("Aggregate function '{0}' failed: {1}")]
	AggregateError(String, String),

	#[error("Unknown function '{0}'")]
	UnknownFunction(String),
}
