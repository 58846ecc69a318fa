//! Resolution of syntax-tree expressions into compiled expressions.
//!
//! This is the second-pass workhorse: recursive descent over [`Expr`],
//! producing a [`CalcExpr`] with identifier references bound to node ids,
//! plus the ordered list of nodes the expression reads.
use crate::ast::Expr;
use crate::error::CompileError;
use crate::store::{AggregateOp, CalcExpr, DepList, Graph, NodeId, NodeKind};
use std::collections::HashMap;

/// How unresolved identifiers are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdentMode {
    /// Unknown names are a compile error.
    Strict,
    /// Unknown names create Param nodes on demand. Active only inside a
    /// RANGE target expression, where item properties bind by name.
    AutoParam,
}

pub(crate) struct Resolver<'g> {
    pub graph: &'g mut Graph,
    /// Input nodes deduplicated by key across the whole graph.
    pub inputs_by_key: &'g mut HashMap<String, NodeId>,
    /// Sequence for anonymous `$Range_<n>` scaffolding names.
    pub range_seq: &'g mut u32,
}

impl<'g> Resolver<'g> {
    /// Resolves `expr`, returning the compiled form and its dependencies in
    /// first-reference order (deduplicated).
    pub fn resolve(
        &mut self,
        expr: &Expr,
        mode: IdentMode,
    ) -> Result<(CalcExpr, Vec<NodeId>), CompileError> {
        let mut deps = Vec::new();
        let calc = self.resolve_inner(expr, mode, &mut deps)?;
        Ok((calc, deps))
    }

    /// Resolves the two RANGE arguments: source strictly, target with
    /// on-demand Params. Returns (source, target, all deps, target roots).
    pub fn resolve_range_parts(
        &mut self,
        args: &[Expr],
        mode: IdentMode,
    ) -> Result<(CalcExpr, CalcExpr, Vec<NodeId>, Vec<NodeId>), CompileError> {
        if args.len() != 2 {
            return Err(CompileError::MalformedCall {
                func: "RANGE".to_string(),
                msg: format!("expected (source, target), got {} arguments", args.len()),
            });
        }
        let (source, src_deps) = self.resolve(&args[0], mode)?;
        let (target, tgt_deps) = self.resolve(&args[1], IdentMode::AutoParam)?;

        let mut all = src_deps;
        for dep in &tgt_deps {
            if !all.contains(dep) {
                all.push(*dep);
            }
        }
        Ok((source, target, all, tgt_deps))
    }

    fn resolve_inner(
        &mut self,
        expr: &Expr,
        mode: IdentMode,
        deps: &mut Vec<NodeId>,
    ) -> Result<CalcExpr, CompileError> {
        match expr {
            Expr::Number(n) => Ok(CalcExpr::Number(*n)),
            Expr::Str(s) => Ok(CalcExpr::Text(s.clone())),
            Expr::Paren(inner) => self.resolve_inner(inner, mode, deps),
            Expr::Identifier(name) => {
                let id = self.bind_identifier(name, mode)?;
                record_dep(deps, id);
                Ok(CalcExpr::NodeRef(id))
            }
            Expr::Unary { op, operand } => Ok(CalcExpr::Unary {
                op: *op,
                operand: Box::new(self.resolve_inner(operand, mode, deps)?),
            }),
            Expr::Binary { op, lhs, rhs } => Ok(CalcExpr::Binary {
                op: *op,
                lhs: Box::new(self.resolve_inner(lhs, mode, deps)?),
                rhs: Box::new(self.resolve_inner(rhs, mode, deps)?),
            }),
            Expr::Call { name, args } => self.resolve_call(name, args, mode, deps),
        }
    }

    fn resolve_call(
        &mut self,
        name: &str,
        args: &[Expr],
        mode: IdentMode,
        deps: &mut Vec<NodeId>,
    ) -> Result<CalcExpr, CompileError> {
        let upper = name.to_ascii_uppercase();
        match upper.as_str() {
            "SUM" | "AVERAGE" | "MIN" | "MAX" => {
                let op = match upper.as_str() {
                    "SUM" => AggregateOp::Sum,
                    "AVERAGE" => AggregateOp::Average,
                    "MIN" => AggregateOp::Min,
                    _ => AggregateOp::Max,
                };
                let resolved = args
                    .iter()
                    .map(|a| self.resolve_inner(a, mode, deps))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CalcExpr::Aggregate { op, args: resolved })
            }
            "IF" => {
                if args.len() != 3 {
                    return Err(CompileError::MalformedCall {
                        func: "IF".to_string(),
                        msg: format!("expected (cond, a, b), got {} arguments", args.len()),
                    });
                }
                Ok(CalcExpr::If {
                    cond: Box::new(self.resolve_inner(&args[0], mode, deps)?),
                    then: Box::new(self.resolve_inner(&args[1], mode, deps)?),
                    otherwise: Box::new(self.resolve_inner(&args[2], mode, deps)?),
                })
            }
            "INPUT" => {
                let key = input_key(args)?;
                let id = self.bind_input(&key)?;
                record_dep(deps, id);
                Ok(CalcExpr::NodeRef(id))
            }
            "CONST" => match args {
                [one] => match unwrap_parens(one) {
                    Expr::Number(n) => Ok(CalcExpr::Number(*n)),
                    Expr::Str(s) => Ok(CalcExpr::Text(s.clone())),
                    _ => Err(CompileError::MalformedCall {
                        func: "CONST".to_string(),
                        msg: "argument must be a literal".to_string(),
                    }),
                },
                _ => Err(CompileError::MalformedCall {
                    func: "CONST".to_string(),
                    msg: format!("expected 1 argument, got {}", args.len()),
                }),
            },
            "RANGE" => {
                let (source, target, range_deps, target_roots) =
                    self.resolve_range_parts(args, mode)?;
                *self.range_seq += 1;
                let scaffold = format!("$Range_{}", self.range_seq);
                let id = self.graph.add_node(
                    &scaffold,
                    NodeKind::Range {
                        source,
                        target,
                        target_roots: target_roots.into_iter().collect(),
                    },
                    range_deps.into_iter().collect(),
                )?;
                record_dep(deps, id);
                Ok(CalcExpr::NodeRef(id))
            }
            _ => Err(CompileError::UnknownFunction(name.to_string())),
        }
    }

    fn bind_identifier(&mut self, name: &str, mode: IdentMode) -> Result<NodeId, CompileError> {
        if let Some(id) = self.graph.id_of(name) {
            return Ok(id);
        }
        match mode {
            IdentMode::Strict => Err(CompileError::UndefinedVariable(name.to_string())),
            IdentMode::AutoParam => self.graph.add_node(name, NodeKind::Param, DepList::new()),
        }
    }

    /// Binds an inline `INPUT("key")`, reusing any input node that already
    /// carries the key, else creating a `$Input_<key>` scaffolding node.
    fn bind_input(&mut self, key: &str) -> Result<NodeId, CompileError> {
        if let Some(&id) = self.inputs_by_key.get(key) {
            return Ok(id);
        }
        let scaffold = format!("$Input_{}", key);
        let id = self.graph.add_node(
            &scaffold,
            NodeKind::Input {
                key: key.to_string(),
            },
            DepList::new(),
        )?;
        self.inputs_by_key.insert(key.to_string(), id);
        Ok(id)
    }
}

/// Extracts the single string key of an `Input(...)` call.
pub(crate) fn input_key(args: &[Expr]) -> Result<String, CompileError> {
    match args {
        [one] => match unwrap_parens(one) {
            Expr::Str(key) => Ok(key.clone()),
            other => Err(CompileError::MalformedCall {
                func: "INPUT".to_string(),
                msg: format!("key must be a string literal, got {:?}", other),
            }),
        },
        _ => Err(CompileError::MalformedCall {
            func: "INPUT".to_string(),
            msg: format!("expected 1 argument, got {}", args.len()),
        }),
    }
}

pub(crate) fn unwrap_parens(expr: &Expr) -> &Expr {
    match expr {
        Expr::Paren(inner) => unwrap_parens(inner),
        other => other,
    }
}

fn record_dep(deps: &mut Vec<NodeId>, id: NodeId) {
    if !deps.contains(&id) {
        deps.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;

    fn fixture() -> (Graph, HashMap<String, NodeId>, u32) {
        (Graph::new(), HashMap::new(), 0)
    }

    #[test]
    fn test_inline_input_dedups_by_key() {
        let (mut graph, mut inputs, mut seq) = fixture();
        let mut r = Resolver {
            graph: &mut graph,
            inputs_by_key: &mut inputs,
            range_seq: &mut seq,
        };
        let expr = Expr::binary(
            BinaryOp::Add,
            Expr::call("INPUT", vec![Expr::text("k")]),
            Expr::call("INPUT", vec![Expr::text("k")]),
        );
        let (_, deps) = r.resolve(&expr, IdentMode::Strict).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(graph.count(), 1);
        assert_eq!(graph.name_of(deps[0]), "$Input_k");
    }

    #[test]
    fn test_inline_range_gets_scaffolding_name() {
        let (mut graph, mut inputs, mut seq) = fixture();
        graph
            .add_node(
                "items",
                NodeKind::Input { key: "items".into() },
                DepList::new(),
            )
            .unwrap();
        let mut r = Resolver {
            graph: &mut graph,
            inputs_by_key: &mut inputs,
            range_seq: &mut seq,
        };
        let expr = Expr::call(
            "SUM",
            vec![Expr::call(
                "RANGE",
                vec![Expr::ident("items"), Expr::ident("qty")],
            )],
        );
        let (_, deps) = r.resolve(&expr, IdentMode::Strict).unwrap();
        let range_id = deps[0];
        assert_eq!(graph.name_of(range_id), "$Range_1");
        // The auto-created Param is a dependency of the range, not of us.
        assert!(graph.id_of("qty").is_some());
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn test_strict_mode_rejects_unknown_names() {
        let (mut graph, mut inputs, mut seq) = fixture();
        let mut r = Resolver {
            graph: &mut graph,
            inputs_by_key: &mut inputs,
            range_seq: &mut seq,
        };
        let err = r.resolve(&Expr::ident("nope"), IdentMode::Strict).unwrap_err();
        assert_eq!(err, CompileError::UndefinedVariable("nope".into()));
    }

    #[test]
    fn test_const_requires_literal() {
        let (mut graph, mut inputs, mut seq) = fixture();
        let mut r = Resolver {
            graph: &mut graph,
            inputs_by_key: &mut inputs,
            range_seq: &mut seq,
        };
        let ok = Expr::call("CONST", vec![Expr::num(5.0)]);
        assert_eq!(
            r.resolve(&ok, IdentMode::Strict).unwrap().0,
            CalcExpr::Number(5.0)
        );
        let bad = Expr::call("CONST", vec![Expr::ident("x")]);
        assert!(matches!(
            r.resolve(&bad, IdentMode::Strict),
            Err(CompileError::MalformedCall { .. })
        ));
    }
}
