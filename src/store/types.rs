//! Node identifiers, node kinds, and the compiled-expression data they carry.
use crate::ast::{BinaryOp, UnaryOp};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// A stable arena index identifying a node within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline(always)]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
    pub fn new(idx: usize) -> Self {
        Self(idx as u32)
    }
}

/// Per-node dependency list. Most nodes read only a handful of others.
pub type DepList = SmallVec<[NodeId; 4]>;

/// A compiled expression: the executable form of a formula's right-hand side.
///
/// Identifier references are already resolved to [`NodeId`]s, so interpreting
/// one of these never touches the source tree again. Re-running a node "in the
/// current context" means re-interpreting its `CalcExpr` against a child scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CalcExpr {
    Number(f64),
    Text(String),
    NodeRef(NodeId),
    Unary {
        op: UnaryOp,
        operand: Box<CalcExpr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<CalcExpr>,
        rhs: Box<CalcExpr>,
    },
    Aggregate {
        op: AggregateOp,
        args: Vec<CalcExpr>,
    },
    If {
        cond: Box<CalcExpr>,
        then: Box<CalcExpr>,
        otherwise: Box<CalcExpr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateOp {
    Sum,
    Average,
    Min,
    Max,
}

/// The closed set of node kinds a graph may contain.
///
/// `RangeItem` nodes only ever exist in evaluated graphs; the other five are
/// produced by the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Fixed scalar or string value.
    Constant(Value),
    /// Placeholder for an externally supplied value, looked up by key.
    Input { key: String },
    /// Placeholder bound only inside Range iteration. Evaluates via context
    /// lookup of its own name, defaulting to 0.0 when absent.
    Param,
    Formula(CalcExpr),
    Range {
        source: CalcExpr,
        target: CalcExpr,
        /// The dependencies belonging to the target expression specifically;
        /// these are the roots of the per-item cloning pass.
        target_roots: DepList,
    },
    /// Materialized per Range iteration after evaluation.
    RangeItem {
        /// 1-based iteration index.
        index: usize,
        /// The scalar result for this item.
        result: f64,
        /// The captured item property values.
        properties: BTreeMap<String, Value>,
        /// Name of the parent Range node, for display.
        parent: String,
    },
}

impl NodeKind {
    pub fn is_input(&self) -> bool {
        matches!(self, NodeKind::Input { .. })
    }

    pub fn is_param(&self) -> bool {
        matches!(self, NodeKind::Param)
    }
}

impl serde::Serialize for UnaryOp {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
        })
    }
}

impl<'de> serde::Deserialize<'de> for UnaryOp {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        match s.as_str() {
            "+" => Ok(UnaryOp::Plus),
            "-" => Ok(UnaryOp::Minus),
            other => Err(serde::de::Error::custom(format!("bad unary op '{}'", other))),
        }
    }
}

impl serde::Serialize for BinaryOp {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.symbol())
    }
}

impl<'de> serde::Deserialize<'de> for BinaryOp {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        BinaryOp::from_symbol(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("bad binary op '{}'", s)))
    }
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Ge => ">=",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
        }
    }

    pub fn from_symbol(s: &str) -> Option<BinaryOp> {
        Some(match s {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "^" => BinaryOp::Pow,
            ">" => BinaryOp::Gt,
            "<" => BinaryOp::Lt,
            ">=" => BinaryOp::Ge,
            "<=" => BinaryOp::Le,
            "=" => BinaryOp::Eq,
            "<>" => BinaryOp::Ne,
            _ => return None,
        })
    }
}
