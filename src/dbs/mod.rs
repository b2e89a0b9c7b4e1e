//! The query iteration core: statement model, permission gate, source
//! drivers, and the Split/Group/Order/Window post-processing pipeline.

pub mod eval;
pub mod group;
pub mod iterator;
pub mod options;
pub mod order;
pub mod perms;
pub mod result;
pub mod split;
pub mod statement;
pub mod stop;

pub use eval::{DefaultEvaluator, Evaluator, ScalarKind};
pub use iterator::Iterator;
pub use options::{AuthLevel, Options};
pub use statement::{Fields, ModelSpec, Statement, What};
pub use stop::StopLatch;
