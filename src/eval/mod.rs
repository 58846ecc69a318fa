//! Executes compiled graphs.
pub mod context;
pub mod engine;
pub(crate) mod expand;
pub mod inputs;
pub(crate) mod interp;
pub(crate) mod prune;

pub use context::Scope;
pub use engine::{evaluate, Evaluation};
pub use inputs::{InputProvider, InputSet};
