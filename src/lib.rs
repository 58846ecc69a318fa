//! costmodel_core: a compile-and-evaluate engine for expression-based cost
//! models.
//!
//! A parsed model (a list of [`ast::Statement`]s) compiles into an immutable
//! dependency-graph template. Each evaluation deep-clones that template,
//! executes it in topological order against a chain of input providers,
//! expands `Range` iterations into inspectable per-item subgraphs, and prunes
//! scaffolding before handing the graph back for display. Scenario batches
//! and sensitivity sweeps re-drive the same template against many input sets.
//!
//! ```
//! use costmodel_core::ast::{BinaryOp, Declaration, Expr, Statement};
//! use costmodel_core::{compile, evaluate, InputSet, Value};
//!
//! let model = compile(&[
//!     Statement::declare("price", Declaration::Input { key: "price".into() }),
//!     Statement::assign(
//!         "total",
//!         Expr::binary(BinaryOp::Mul, Expr::ident("price"), Expr::num(3.0)),
//!     ),
//! ])
//! .unwrap();
//!
//! let mut inputs = InputSet::new();
//! inputs.insert("price".into(), Value::Number(10.0));
//! let run = evaluate(&model, &[&inputs]).unwrap();
//! assert_eq!(run.results["total"], Value::Number(30.0));
//! ```
pub mod analysis;
pub mod ast;
pub mod compile;
pub mod display;
pub mod error;
pub mod eval;
pub mod store;
pub mod value;

pub use analysis::{
    analyze_sensitivity, detect_key_drivers, run_scenarios, DriverScore, SensitivitySeries,
    SweepConfig, SweepPoint,
};
pub use compile::{compile, CompiledModel};
pub use display::{format_trace, serialize_for_display, GraphView};
pub use error::{CompileError, EvalError};
pub use eval::{evaluate, Evaluation, InputProvider, InputSet};
pub use store::{Graph, NodeId, NodeKind};
pub use value::Value;
