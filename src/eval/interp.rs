//! The compiled-expression interpreter.
//!
//! One dispatch point executes every `CalcExpr`. The identifier rule lives
//! here: a reference to a volatile node re-interprets that node's expression
//! in the current context (for a Range, re-running the whole iteration); a
//! reference to anything else reads the global results entry the walk
//! already produced.
use crate::ast::{BinaryOp, UnaryOp};
use crate::error::EvalError;
use crate::eval::context::Scope;
use crate::store::{AggregateOp, CalcExpr, Graph, NodeId, NodeKind};
use crate::value::{approx_eq, Value};
use std::collections::BTreeMap;

pub(crate) struct Interp<'a> {
    pub graph: &'a Graph,
    /// Compile-time volatility map; evaluation artifacts index past its end
    /// and are never volatile.
    pub volatile: &'a [bool],
}

impl<'a> Interp<'a> {
    pub fn is_volatile(&self, id: NodeId) -> bool {
        self.volatile.get(id.index()).copied().unwrap_or(false)
    }

    pub fn eval(&self, expr: &CalcExpr, scope: &Scope) -> Result<Value, EvalError> {
        match expr {
            CalcExpr::Number(n) => Ok(Value::Number(*n)),
            CalcExpr::Text(s) => Ok(Value::Text(s.clone())),
            CalcExpr::NodeRef(id) => self.node_ref(*id, scope),
            CalcExpr::Unary { op, operand } => {
                let n = self.eval(operand, scope)?.as_number()?;
                Ok(Value::Number(match op {
                    UnaryOp::Plus => n,
                    UnaryOp::Minus => -n,
                }))
            }
            CalcExpr::Binary { op, lhs, rhs } => {
                let l = self.eval(lhs, scope)?.as_number()?;
                let r = self.eval(rhs, scope)?.as_number()?;
                Ok(Value::Number(binary(*op, l, r)))
            }
            CalcExpr::Aggregate { op, args } => {
                let mut flat = Vec::new();
                for arg in args {
                    self.eval(arg, scope)?.flatten_into(&mut flat)?;
                }
                Ok(Value::Number(aggregate(*op, &flat)))
            }
            CalcExpr::If {
                cond,
                then,
                otherwise,
            } => {
                let c = self.eval(cond, scope)?.as_number()?;
                if c != 0.0 {
                    self.eval(then, scope)
                } else {
                    self.eval(otherwise, scope)
                }
            }
        }
    }

    /// Re-invokes a node's own computation in `scope`.
    ///
    /// This is the path taken for volatile references and for the expansion
    /// pass evaluating template clones under an item context.
    pub fn eval_node(&self, id: NodeId, scope: &Scope) -> Result<Value, EvalError> {
        match self.graph.kind(id) {
            NodeKind::Param => Ok(scope
                .lookup(self.graph.name_of(id))
                .cloned()
                .unwrap_or(Value::Number(0.0))),
            NodeKind::Constant(v) => Ok(v.clone()),
            NodeKind::Formula(expr) => self.eval(expr, scope),
            NodeKind::Range { source, target, .. } => {
                let name = self.graph.name_of(id);
                let (_, values) = self.iterate_range(name, source, target, scope)?;
                Ok(Value::Array(values.into_iter().map(Value::Number).collect()))
            }
            NodeKind::RangeItem { result, .. } => Ok(Value::Number(*result)),
            NodeKind::Input { .. } => {
                // Inputs are never volatile; reaching here means the walk
                // skipped one, which is an ordering bug.
                Err(EvalError::MissingValue(self.graph.name_of(id).to_string()))
            }
        }
    }

    fn node_ref(&self, id: NodeId, scope: &Scope) -> Result<Value, EvalError> {
        let kind = self.graph.kind(id);
        if kind.is_param() || self.is_volatile(id) {
            return self.eval_node(id, scope);
        }
        let name = self.graph.name_of(id);
        scope
            .global(name)
            .cloned()
            .ok_or_else(|| EvalError::MissingValue(name.to_string()))
    }

    /// Runs a Range's iteration: evaluates the source, binds each item's
    /// properties in a child scope, and computes the target per item.
    ///
    /// Returns the materialized items alongside the per-item scalars so the
    /// expansion pass can reuse one call for both.
    pub fn iterate_range(
        &self,
        range_name: &str,
        source: &CalcExpr,
        target: &CalcExpr,
        scope: &Scope,
    ) -> Result<(Vec<BTreeMap<String, Value>>, Vec<f64>), EvalError> {
        let items = self.collection_items(range_name, source, scope)?;
        let mut values = Vec::with_capacity(items.len());
        for item in &items {
            let child = Scope::child(item.clone(), scope);
            values.push(self.eval(target, &child)?.as_number()?);
        }
        Ok((items, values))
    }

    /// Evaluates a Range source and checks every item is an object.
    pub fn collection_items(
        &self,
        range_name: &str,
        source: &CalcExpr,
        scope: &Scope,
    ) -> Result<Vec<BTreeMap<String, Value>>, EvalError> {
        let collection = self.eval(source, scope)?;
        let items = match collection {
            Value::Array(items) => items,
            other => {
                return Err(EvalError::NotACollection {
                    range: range_name.to_string(),
                    found: other.type_name().to_string(),
                })
            }
        };
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(props) => Ok(props),
                _ => Err(EvalError::MalformedItem {
                    range: range_name.to_string(),
                    index: i + 1,
                }),
            })
            .collect()
    }
}

fn binary(op: BinaryOp, l: f64, r: f64) -> f64 {
    match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        // Division by zero keeps IEEE-754 semantics (inf/NaN).
        BinaryOp::Div => l / r,
        BinaryOp::Pow => l.powf(r),
        BinaryOp::Gt => bool_num(l > r),
        BinaryOp::Lt => bool_num(l < r),
        BinaryOp::Ge => bool_num(l >= r),
        BinaryOp::Le => bool_num(l <= r),
        BinaryOp::Eq => bool_num(approx_eq(l, r)),
        BinaryOp::Ne => bool_num(!approx_eq(l, r)),
    }
}

fn bool_num(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn aggregate(op: AggregateOp, values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    match op {
        AggregateOp::Sum => values.iter().sum(),
        AggregateOp::Average => values.iter().sum::<f64>() / values.len() as f64,
        AggregateOp::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        AggregateOp::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn eval_standalone(expr: &CalcExpr) -> Result<Value, EvalError> {
        let graph = Graph::new();
        let results = BTreeMap::new();
        let interp = Interp {
            graph: &graph,
            volatile: &[],
        };
        interp.eval(expr, &Scope::root(&results))
    }

    fn bin(op: BinaryOp, l: f64, r: f64) -> CalcExpr {
        CalcExpr::Binary {
            op,
            lhs: Box::new(CalcExpr::Number(l)),
            rhs: Box::new(CalcExpr::Number(r)),
        }
    }

    #[rstest]
    #[case(BinaryOp::Add, 2.0, 3.0, 5.0)]
    #[case(BinaryOp::Sub, 2.0, 3.0, -1.0)]
    #[case(BinaryOp::Mul, 2.0, 3.0, 6.0)]
    #[case(BinaryOp::Div, 3.0, 2.0, 1.5)]
    #[case(BinaryOp::Pow, 2.0, 10.0, 1024.0)]
    #[case(BinaryOp::Gt, 3.0, 2.0, 1.0)]
    #[case(BinaryOp::Lt, 3.0, 2.0, 0.0)]
    #[case(BinaryOp::Ge, 2.0, 2.0, 1.0)]
    #[case(BinaryOp::Le, 3.0, 2.0, 0.0)]
    fn test_binary_operators(
        #[case] op: BinaryOp,
        #[case] l: f64,
        #[case] r: f64,
        #[case] expected: f64,
    ) {
        assert_eq!(
            eval_standalone(&bin(op, l, r)).unwrap(),
            Value::Number(expected)
        );
    }

    #[test]
    fn test_unary_operators() {
        let expr = CalcExpr::Unary {
            op: UnaryOp::Minus,
            operand: Box::new(CalcExpr::Number(4.0)),
        };
        assert_eq!(eval_standalone(&expr).unwrap(), Value::Number(-4.0));
        let expr = CalcExpr::Unary {
            op: UnaryOp::Plus,
            operand: Box::new(CalcExpr::Number(4.0)),
        };
        assert_eq!(eval_standalone(&expr).unwrap(), Value::Number(4.0));
    }

    #[test]
    fn test_epsilon_equality_operators() {
        assert_eq!(
            eval_standalone(&bin(BinaryOp::Eq, 0.1 + 0.2, 0.3)).unwrap(),
            Value::Number(1.0)
        );
        assert_eq!(
            eval_standalone(&bin(BinaryOp::Ne, 0.1 + 0.2, 0.3)).unwrap(),
            Value::Number(0.0)
        );
    }

    #[test]
    fn test_division_by_zero_is_ieee() {
        let v = eval_standalone(&bin(BinaryOp::Div, 1.0, 0.0)).unwrap();
        assert_eq!(v, Value::Number(f64::INFINITY));
    }

    #[test]
    fn test_empty_aggregates_are_zero() {
        for op in [
            AggregateOp::Sum,
            AggregateOp::Average,
            AggregateOp::Min,
            AggregateOp::Max,
        ] {
            let expr = CalcExpr::Aggregate { op, args: vec![] };
            assert_eq!(eval_standalone(&expr).unwrap(), Value::Number(0.0));
        }
    }

    #[test]
    fn test_if_only_evaluates_chosen_branch() {
        // The untaken branch references a missing node; it must not run.
        let expr = CalcExpr::If {
            cond: Box::new(CalcExpr::Number(1.0)),
            then: Box::new(CalcExpr::Number(7.0)),
            otherwise: Box::new(CalcExpr::NodeRef(NodeId::new(99))),
        };
        let mut graph = Graph::new();
        for i in 0..100 {
            graph
                .add_node(
                    &format!("n{}", i),
                    NodeKind::Constant(Value::Number(0.0)),
                    Default::default(),
                )
                .unwrap();
        }
        let results = BTreeMap::new();
        let interp = Interp {
            graph: &graph,
            volatile: &[],
        };
        let v = interp.eval(&expr, &Scope::root(&results)).unwrap();
        assert_eq!(v, Value::Number(7.0));
    }
}
