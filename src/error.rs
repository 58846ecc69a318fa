//! Error taxonomies for compilation and evaluation.
use thiserror::Error;

/// Errors produced while translating a syntax tree into a graph.
///
/// Compilation is all-or-nothing: any of these aborts the translation and no
/// partial graph is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    #[error("duplicate definition of '{0}'")]
    DuplicateDefinition(String),
    #[error("node name '{0}' is already registered")]
    DuplicateNode(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("{func}: {msg}")]
    MalformedCall { func: String, msg: String },
    #[error("unsupported syntax: {0}")]
    UnsupportedSyntax(String),
}

/// Errors produced while executing a compiled graph.
///
/// These abort the evaluation that raised them; the compiled template is
/// cloned before any mutation and stays valid for the next run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("cycle detected involving node '{0}'")]
    Cycle(String),
    #[error("range source of '{range}' is not a collection (got {found})")]
    NotACollection { range: String, found: String },
    #[error("item {index} of range '{range}' is not an object")]
    MalformedItem { range: String, index: usize },
    #[error("expected a scalar but got a collection: {0}")]
    CollectionAsScalar(String),
    #[error("cannot convert '{0}' to a number")]
    NonNumeric(String),
    #[error("no input provider supplied a value for key '{0}'")]
    MissingInput(String),
    #[error("input '{key}' could not be decoded: {msg}")]
    InputDecode { key: String, msg: String },
    #[error("value for node '{0}' missing from results")]
    MissingValue(String),
    #[error("invalid analysis config: {0}")]
    InvalidConfig(String),
}
