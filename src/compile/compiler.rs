//! Two-pass translation of a syntax tree into a compiled graph.
//!
//! Pass 1 creates exactly one node per declared or assigned name, so that
//! formulas may forward-reference names not yet visited. Pass 2 resolves
//! every deferred expression into a [`CalcExpr`] and a dependency list.
use crate::analysis::volatility;
use crate::ast::{Declaration, Expr, Statement};
use crate::compile::expr::{input_key, unwrap_parens, IdentMode, Resolver};
use crate::error::CompileError;
use crate::store::{CalcExpr, DepList, Graph, NodeId, NodeKind};
use crate::value::Value;
use std::collections::HashMap;

/// The immutable template produced by compilation.
///
/// Never evaluated in place: every evaluation deep-clones the graph first.
/// The volatility bitmap is derived once here and shared by all runs.
#[derive(Debug, Clone)]
pub struct CompiledModel {
    graph: Graph,
    volatile: Vec<bool>,
    templates: Vec<bool>,
}

impl CompiledModel {
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Whether a node's value depends on loop-local Param bindings.
    ///
    /// Nodes created after compilation (evaluation artifacts) are never
    /// volatile, hence the out-of-range default.
    pub fn is_volatile(&self, id: NodeId) -> bool {
        self.volatile.get(id.index()).copied().unwrap_or(false)
    }

    /// Whether a node is claimed as a per-item template by some Range.
    pub fn is_template(&self, id: NodeId) -> bool {
        self.templates.get(id.index()).copied().unwrap_or(false)
    }

    pub(crate) fn volatile_map(&self) -> &[bool] {
        &self.volatile
    }

    pub(crate) fn template_map(&self) -> &[bool] {
        &self.templates
    }
}

enum Pending<'a> {
    Formula(NodeId, &'a Expr),
    Range(NodeId, &'a [Expr]),
    Reference(NodeId, &'a str),
}

/// Compiles statements into a [`CompiledModel`], or fails with the first
/// compilation error. No partial graph is ever returned.
pub fn compile(statements: &[Statement]) -> Result<CompiledModel, CompileError> {
    let _span = tracing::info_span!("compile", statements = statements.len()).entered();

    let mut graph = Graph::new();
    let mut inputs_by_key: HashMap<String, NodeId> = HashMap::new();
    let mut range_seq: u32 = 0;
    let mut pending: Vec<Pending> = Vec::new();

    // Pass 1: one node per name.
    for statement in statements {
        match statement {
            Statement::Assignment { name, expr } => {
                declare_assignment(&mut graph, &mut inputs_by_key, &mut pending, name, expr)?;
            }
            Statement::Declaration { name, decl } => {
                check_fresh(&graph, name)?;
                match decl {
                    Declaration::Input { key } => {
                        let id = graph.add_node(
                            name,
                            NodeKind::Input { key: key.clone() },
                            DepList::new(),
                        )?;
                        inputs_by_key.entry(key.clone()).or_insert(id);
                    }
                    Declaration::Param => {
                        graph.add_node(name, NodeKind::Param, DepList::new())?;
                    }
                    Declaration::Const { value } => {
                        graph.add_node(name, NodeKind::Constant(value.clone()), DepList::new())?;
                    }
                    Declaration::Reference { target } => {
                        let id = graph.add_node(name, placeholder(), DepList::new())?;
                        pending.push(Pending::Reference(id, target));
                    }
                }
            }
        }
    }

    // Pass 2: resolve deferred expressions into edges and compiled forms.
    for work in pending {
        let mut resolver = Resolver {
            graph: &mut graph,
            inputs_by_key: &mut inputs_by_key,
            range_seq: &mut range_seq,
        };
        match work {
            Pending::Formula(id, expr) => {
                let (calc, deps) = resolver.resolve(expr, IdentMode::Strict)?;
                graph.set_kind(id, NodeKind::Formula(calc));
                graph.set_deps(id, deps.into_iter().collect());
            }
            Pending::Range(id, args) => {
                let (source, target, deps, target_roots) =
                    resolver.resolve_range_parts(args, IdentMode::Strict)?;
                graph.set_kind(
                    id,
                    NodeKind::Range {
                        source,
                        target,
                        target_roots: target_roots.into_iter().collect(),
                    },
                );
                graph.set_deps(id, deps.into_iter().collect());
            }
            Pending::Reference(id, target) => {
                let target_id = resolver
                    .graph
                    .id_of(target)
                    .ok_or_else(|| CompileError::UndefinedVariable(target.to_string()))?;
                graph.set_kind(id, NodeKind::Formula(CalcExpr::NodeRef(target_id)));
                graph.set_deps(id, [target_id].into_iter().collect());
            }
        }
    }

    let volatile = volatility::compute(&graph);
    let templates = volatility::template_set(&graph, &volatile);
    Ok(CompiledModel {
        graph,
        volatile,
        templates,
    })
}

fn declare_assignment<'a>(
    graph: &mut Graph,
    inputs_by_key: &mut HashMap<String, NodeId>,
    pending: &mut Vec<Pending<'a>>,
    name: &str,
    expr: &'a Expr,
) -> Result<(), CompileError> {
    check_fresh(graph, name)?;
    match unwrap_parens(expr) {
        Expr::Number(n) => {
            graph.add_node(name, NodeKind::Constant(Value::Number(*n)), DepList::new())?;
        }
        Expr::Str(s) => {
            graph.add_node(name, NodeKind::Constant(Value::Text(s.clone())), DepList::new())?;
        }
        Expr::Call { name: func, args } if func.eq_ignore_ascii_case("input") => {
            // `x = Input("k")` and `x: Input("k")` must yield the identical
            // single node; no wrapper is created for the assignment form.
            let key = input_key(args)?;
            let id = graph.add_node(name, NodeKind::Input { key: key.clone() }, DepList::new())?;
            inputs_by_key.entry(key).or_insert(id);
        }
        Expr::Call { name: func, args } if func.eq_ignore_ascii_case("range") => {
            let id = graph.add_node(name, placeholder_range(), DepList::new())?;
            pending.push(Pending::Range(id, args));
        }
        other => {
            let id = graph.add_node(name, placeholder(), DepList::new())?;
            pending.push(Pending::Formula(id, other));
        }
    }
    Ok(())
}

fn check_fresh(graph: &Graph, name: &str) -> Result<(), CompileError> {
    if graph.id_of(name).is_some() {
        return Err(CompileError::DuplicateDefinition(name.to_string()));
    }
    Ok(())
}

// Pass-1 placeholders, overwritten during resolution.
fn placeholder() -> NodeKind {
    NodeKind::Formula(CalcExpr::Number(0.0))
}

fn placeholder_range() -> NodeKind {
    NodeKind::Range {
        source: CalcExpr::Number(0.0),
        target: CalcExpr::Number(0.0),
        target_roots: DepList::new(),
    }
}
