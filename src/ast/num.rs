// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

use super::eval::{ConstEnv, EvalEnv, to_integer};
use super::{IndexExpr, NodeId, VarPoint};
use crate::analysis_err;
use crate::builtins;
use crate::common::{Result, VarMap, quoted};
use crate::idiv::imod_flr;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Sub,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Sub => "-",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        }
    }
}

/// Operators whose operands may be rearranged.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CommOp {
    Add,
    Mul,
}

impl CommOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommOp::Add => "+",
            CommOp::Mul => "*",
        }
    }

    /// Identity element the operands are folded onto.
    pub fn base_value(&self) -> f64 {
        match self {
            CommOp::Add => 0.0,
            CommOp::Mul => 1.0,
        }
    }

    fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            CommOp::Add => lhs + rhs,
            CommOp::Mul => lhs * rhs,
        }
    }
}

/// An n-ary add or multiply, e.g. `a + b + c`.
#[derive(Clone, Debug)]
pub struct CommExpr {
    op: CommOp,
    ops: Vec<NumExpr>,
}

impl CommExpr {
    pub fn new(op: CommOp) -> Self {
        CommExpr { op, ops: vec![] }
    }

    pub fn op(&self) -> CommOp {
        self.op
    }

    pub fn ops(&self) -> &[NumExpr] {
        &self.ops
    }

    pub fn ops_mut(&mut self) -> &mut Vec<NumExpr> {
        &mut self.ops
    }

    pub fn append_op(&mut self, op: NumExpr) {
        self.ops.push(op);
    }

    /// Add `op` as an operand.  If `op` is itself a commutative expression
    /// with the same operator its operands are spliced in instead, so merging
    /// `c + d` into `a + b` gives `a + b + c + d` while merging `e * f` gives
    /// `a + b + (e * f)`.
    pub fn merge_expr(&mut self, op: NumExpr) {
        match op {
            NumExpr::Comm(other) if other.op == self.op => self.ops.extend(other.ops),
            op => self.ops.push(op),
        }
    }
}

/// A call to a named function, e.g. `sin(x)`.
#[derive(Debug)]
pub struct FuncCall {
    name: String,
    args: Vec<NumExpr>,
    id: NodeId,
}

// a clone is a new node: it gets its own id and so starts out unpaired.
impl Clone for FuncCall {
    fn clone(&self) -> Self {
        FuncCall {
            name: self.name.clone(),
            args: self.args.clone(),
            id: NodeId::next(),
        }
    }
}

impl FuncCall {
    pub fn new(name: &str, args: Vec<NumExpr>) -> Self {
        FuncCall {
            name: name.to_owned(),
            args,
            id: NodeId::next(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[NumExpr] {
        &self.args
    }

    /// Whether both calls have pairwise identical argument lists.
    pub fn has_same_args(&self, other: &FuncCall) -> bool {
        same_list(&self.args, &other.args)
    }
}

/// A numeric expression node.
#[derive(Clone, Debug)]
pub enum NumExpr {
    Const(f64),
    Index(IndexExpr),
    /// An uninterpreted code fragment; opaque to every analysis.
    Code(String),
    Neg(Box<NumExpr>),
    Op2(BinaryOp, Box<NumExpr>, Box<NumExpr>),
    Comm(CommExpr),
    Func(FuncCall),
    Point(VarPoint),
}

pub(super) fn same_list(a: &[NumExpr], b: &[NumExpr]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| a.is_same(b))
}

impl NumExpr {
    /// True iff every leaf below this node is a literal constant.
    pub fn is_constant(&self) -> bool {
        match self {
            NumExpr::Const(_) => true,
            NumExpr::Index(_) | NumExpr::Code(_) | NumExpr::Point(_) => false,
            NumExpr::Neg(e) => e.is_constant(),
            NumExpr::Op2(_, l, r) => l.is_constant() && r.is_constant(),
            NumExpr::Comm(c) => c.ops.iter().all(|e| e.is_constant()),
            NumExpr::Func(f) => f.args.iter().all(|e| e.is_constant()),
        }
    }

    /// Reduce a constant sub-tree to its value.
    pub fn evaluate(&self) -> Result<f64> {
        self.eval(&ConstEnv)
    }

    /// Reduce a constant sub-tree to an integer, failing if the value has a
    /// fractional part.
    pub fn int_value(&self) -> Result<i64> {
        to_integer(self.evaluate()?, self)
    }

    /// Evaluate with dimension indices and var points resolved by `env`.
    pub fn eval<E: EvalEnv + ?Sized>(&self, env: &E) -> Result<f64> {
        match self {
            NumExpr::Const(val) => Ok(*val),
            NumExpr::Index(idx) => env.index_value(idx).map(|v| v as f64),
            NumExpr::Code(_) => analysis_err!(
                NotEvaluable,
                format!(
                    "cannot evaluate {} for a known numerical value",
                    quoted(&self.to_string())
                )
            ),
            NumExpr::Neg(e) => Ok(-e.eval(env)?),
            NumExpr::Op2(op, l, r) => match op {
                BinaryOp::Sub => Ok(l.eval(env)? - r.eval(env)?),
                BinaryOp::Div => Ok(l.eval(env)? / r.eval(env)?),
                BinaryOp::Mod => {
                    let lhs = to_integer(l.eval(env)?, l)?;
                    let rhs = to_integer(r.eval(env)?, r)?;
                    if rhs == 0 {
                        return analysis_err!(DivideByZero, quoted(&self.to_string()));
                    }
                    Ok(imod_flr(lhs, rhs) as f64)
                }
            },
            NumExpr::Comm(c) => {
                let mut val = c.op.base_value();
                for op in c.ops.iter() {
                    val = c.op.apply(val, op.eval(env)?);
                }
                Ok(val)
            }
            NumExpr::Func(f) => {
                let args = f
                    .args
                    .iter()
                    .map(|arg| arg.eval(env))
                    .collect::<Result<SmallVec<[f64; 4]>>>()?;
                builtins::apply(&f.name, &args)
            }
            NumExpr::Point(p) => {
                let indices = p.eval_indices(env)?;
                env.read_point(p, &indices)
            }
        }
    }

    /// If this is `dim`, `dim + c`, `c + dim` or `dim - c` for an integer
    /// constant `c`, return the offset from `dim`.
    pub fn offset_from(&self, dim: &str) -> Option<i64> {
        match self {
            NumExpr::Index(idx) if idx.is_index_of(dim) => Some(0),
            NumExpr::Op2(BinaryOp::Sub, l, r) => match l.as_ref() {
                NumExpr::Index(idx) if idx.is_index_of(dim) => r.const_int().map(|c| -c),
                _ => None,
            },
            NumExpr::Comm(c) if c.op == CommOp::Add && c.ops.len() == 2 => {
                match (&c.ops[0], &c.ops[1]) {
                    (NumExpr::Index(idx), other) if idx.is_index_of(dim) => other.const_int(),
                    (other, NumExpr::Index(idx)) if idx.is_index_of(dim) => other.const_int(),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn const_int(&self) -> Option<i64> {
        if !self.is_constant() {
            return None;
        }
        self.int_value().ok()
    }

    /// Structural equality: same variants, operators and names, and
    /// recursively the same operands in the same order.  Operand order matters
    /// even for commutative operators.
    pub fn is_same(&self, other: &NumExpr) -> bool {
        match (self, other) {
            (NumExpr::Const(a), NumExpr::Const(b)) => a == b,
            (NumExpr::Index(a), NumExpr::Index(b)) => a == b,
            (NumExpr::Code(a), NumExpr::Code(b)) => a == b,
            (NumExpr::Neg(a), NumExpr::Neg(b)) => a.is_same(b),
            (NumExpr::Op2(op1, l1, r1), NumExpr::Op2(op2, l2, r2)) => {
                op1 == op2 && l1.is_same(l2) && r1.is_same(r2)
            }
            (NumExpr::Comm(a), NumExpr::Comm(b)) => a.op == b.op && same_list(&a.ops, &b.ops),
            (NumExpr::Func(a), NumExpr::Func(b)) => a.name == b.name && a.has_same_args(b),
            (NumExpr::Point(a), NumExpr::Point(b)) => a.is_same(b),
            _ => false,
        }
    }

    /// Number of nodes at and below this one.
    pub fn num_nodes(&self) -> usize {
        1 + match self {
            NumExpr::Const(_) | NumExpr::Index(_) | NumExpr::Code(_) => 0,
            NumExpr::Neg(e) => e.num_nodes(),
            NumExpr::Op2(_, l, r) => l.num_nodes() + r.num_nodes(),
            NumExpr::Comm(c) => c.ops.iter().map(NumExpr::num_nodes).sum(),
            NumExpr::Func(f) => f.args.iter().map(NumExpr::num_nodes).sum(),
            NumExpr::Point(p) => p.args().iter().map(NumExpr::num_nodes).sum(),
        }
    }

    /// Whether the running index of `dim` appears anywhere below this node.
    pub fn depends_on(&self, dim: &str) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if let NumExpr::Index(idx) = e {
                found |= idx.is_index_of(dim);
            }
        });
        found
    }

    /// Pre-order traversal of this node and every numeric node below it,
    /// including the index expressions of var points.
    pub fn walk<'a, F: FnMut(&'a NumExpr)>(&'a self, f: &mut F) {
        f(self);
        match self {
            NumExpr::Const(_) | NumExpr::Index(_) | NumExpr::Code(_) => {}
            NumExpr::Neg(e) => e.walk(f),
            NumExpr::Op2(_, l, r) => {
                l.walk(f);
                r.walk(f);
            }
            NumExpr::Comm(c) => c.ops.iter().for_each(|e| e.walk(f)),
            NumExpr::Func(call) => call.args.iter().for_each(|e| e.walk(f)),
            NumExpr::Point(p) => p.args().iter().for_each(|e| e.walk(f)),
        }
    }

    pub fn points(&self) -> Vec<&VarPoint> {
        let mut points = vec![];
        self.walk(&mut |e| {
            if let NumExpr::Point(p) = e {
                points.push(p);
            }
        });
        points
    }

    pub fn func_calls(&self) -> Vec<&FuncCall> {
        let mut calls = vec![];
        self.walk(&mut |e| {
            if let NumExpr::Func(f) = e {
                calls.push(f);
            }
        });
        calls
    }

    /// Recursively merge nested commutative expressions that share an
    /// operator, e.g. `a + (b + c)` becomes `a + b + c`.
    pub fn flatten(self) -> NumExpr {
        match self {
            NumExpr::Neg(e) => NumExpr::Neg(Box::new(e.flatten())),
            NumExpr::Op2(op, l, r) => NumExpr::Op2(op, Box::new(l.flatten()), Box::new(r.flatten())),
            NumExpr::Comm(c) => {
                let mut merged = CommExpr::new(c.op);
                for op in c.ops {
                    merged.merge_expr(op.flatten());
                }
                NumExpr::Comm(merged)
            }
            NumExpr::Func(f) => NumExpr::Func(FuncCall {
                name: f.name,
                args: f.args.into_iter().map(NumExpr::flatten).collect(),
                id: f.id,
            }),
            e => e,
        }
    }

    /// Canonical text, with dimension names substituted through `var_map`.
    pub fn render(&self, var_map: Option<&VarMap>) -> String {
        super::print::num_str(self, var_map)
    }
}

impl From<f64> for NumExpr {
    fn from(val: f64) -> Self {
        NumExpr::Const(val)
    }
}

impl From<VarPoint> for NumExpr {
    fn from(point: VarPoint) -> Self {
        NumExpr::Point(point)
    }
}

impl fmt::Display for NumExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.render(None))
    }
}

impl PartialEq for NumExpr {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

// nodes that are the same render identically, so hashing the rendering
// agrees with `is_same`.
impl Hash for NumExpr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.render(None).hash(state);
    }
}
