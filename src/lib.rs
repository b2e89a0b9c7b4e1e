//! The query iteration core of an embedded document/graph database: source
//! enumeration (single record, table scan, batch, generator, subqueries,
//! inline arrays), permission gating, and the SPLIT → GROUP → ORDER →
//! windowed-yield post-processing pipeline.
//!
//! Call [`dbs::Iterator::new`] with a [`kvs::Transaction`], an
//! [`dbs::Evaluator`], [`dbs::Options`] and a [`dbs::Statement`], then
//! `.output(ctx)` to run it to completion.

pub mod cnf;
pub mod ctx;
pub mod dbs;
pub mod doc;
pub mod err;
pub mod expr;
pub mod fnc;
pub mod key;
pub mod kvs;

pub use ctx::Context;
pub use dbs::{Evaluator, Iterator, Options, Statement};
pub use err::Error;
