// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use super::eval::{ConstEnv, EvalEnv};
use super::NumExpr;
use crate::common::{Result, VarMap};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Neq,
    Lt,
    Gte,
    Gt,
    Lte,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Neq => "!=",
            CmpOp::Lt => "<",
            CmpOp::Gte => ">=",
            CmpOp::Gt => ">",
            CmpOp::Lte => "<=",
        }
    }

    fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Neq => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Gte => lhs >= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Lte => lhs <= rhs,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LogicOp {
    And,
    Or,
}

impl LogicOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicOp::And => "&&",
            LogicOp::Or => "||",
        }
    }
}

/// A boolean expression, used as a sub-domain or step condition.
#[derive(Clone, Debug)]
pub enum BoolExpr {
    Not(Box<BoolExpr>),
    Cmp(CmpOp, Box<NumExpr>, Box<NumExpr>),
    Logic(LogicOp, Box<BoolExpr>, Box<BoolExpr>),
}

impl BoolExpr {
    pub fn is_constant(&self) -> bool {
        match self {
            BoolExpr::Not(e) => e.is_constant(),
            BoolExpr::Cmp(_, l, r) => l.is_constant() && r.is_constant(),
            BoolExpr::Logic(_, l, r) => l.is_constant() && r.is_constant(),
        }
    }

    pub fn evaluate(&self) -> Result<bool> {
        self.eval(&ConstEnv)
    }

    pub fn eval<E: EvalEnv + ?Sized>(&self, env: &E) -> Result<bool> {
        match self {
            BoolExpr::Not(e) => Ok(!e.eval(env)?),
            BoolExpr::Cmp(op, l, r) => Ok(op.apply(l.eval(env)?, r.eval(env)?)),
            BoolExpr::Logic(LogicOp::And, l, r) => Ok(l.eval(env)? && r.eval(env)?),
            BoolExpr::Logic(LogicOp::Or, l, r) => Ok(l.eval(env)? || r.eval(env)?),
        }
    }

    pub fn is_same(&self, other: &BoolExpr) -> bool {
        match (self, other) {
            (BoolExpr::Not(a), BoolExpr::Not(b)) => a.is_same(b),
            (BoolExpr::Cmp(op1, l1, r1), BoolExpr::Cmp(op2, l2, r2)) => {
                op1 == op2 && l1.is_same(l2) && r1.is_same(r2)
            }
            (BoolExpr::Logic(op1, l1, r1), BoolExpr::Logic(op2, l2, r2)) => {
                op1 == op2 && l1.is_same(l2) && r1.is_same(r2)
            }
            _ => false,
        }
    }

    pub fn num_nodes(&self) -> usize {
        1 + match self {
            BoolExpr::Not(e) => e.num_nodes(),
            BoolExpr::Cmp(_, l, r) => l.num_nodes() + r.num_nodes(),
            BoolExpr::Logic(_, l, r) => l.num_nodes() + r.num_nodes(),
        }
    }

    pub fn depends_on(&self, dim: &str) -> bool {
        let mut found = false;
        self.walk_num(&mut |e| {
            if let NumExpr::Index(idx) = e {
                found |= idx.is_index_of(dim);
            }
        });
        found
    }

    /// Pre-order traversal of every numeric node inside this condition.
    pub fn walk_num<'a, F: FnMut(&'a NumExpr)>(&'a self, f: &mut F) {
        match self {
            BoolExpr::Not(e) => e.walk_num(f),
            BoolExpr::Cmp(_, l, r) => {
                l.walk(f);
                r.walk(f);
            }
            BoolExpr::Logic(_, l, r) => {
                l.walk_num(f);
                r.walk_num(f);
            }
        }
    }

    pub fn flatten(self) -> BoolExpr {
        match self {
            BoolExpr::Not(e) => BoolExpr::Not(Box::new(e.flatten())),
            BoolExpr::Cmp(op, l, r) => BoolExpr::Cmp(op, Box::new(l.flatten()), Box::new(r.flatten())),
            BoolExpr::Logic(op, l, r) => {
                BoolExpr::Logic(op, Box::new(l.flatten()), Box::new(r.flatten()))
            }
        }
    }

    pub fn render(&self, var_map: Option<&VarMap>) -> String {
        super::print::bool_str(self, var_map)
    }
}

impl fmt::Display for BoolExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.render(None))
    }
}

impl PartialEq for BoolExpr {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl Not for BoolExpr {
    type Output = BoolExpr;

    fn not(self) -> BoolExpr {
        BoolExpr::Not(Box::new(self))
    }
}

impl BitAnd for BoolExpr {
    type Output = BoolExpr;

    fn bitand(self, rhs: BoolExpr) -> BoolExpr {
        BoolExpr::Logic(LogicOp::And, Box::new(self), Box::new(rhs))
    }
}

impl BitOr for BoolExpr {
    type Output = BoolExpr;

    fn bitor(self, rhs: BoolExpr) -> BoolExpr {
        BoolExpr::Logic(LogicOp::Or, Box::new(self), Box::new(rhs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{constant, domain_index, first_index};
    use crate::common::ErrorCode;

    #[test]
    fn test_evaluate() {
        assert!(constant(1.0).less_than(2.0).evaluate().unwrap());
        assert!(!constant(1.0).greater_than(2.0).evaluate().unwrap());
        assert!(constant(2.0).not_less_than(2.0).evaluate().unwrap());
        assert!(constant(3.0).not_equal_to(2.0).evaluate().unwrap());
        let both = constant(1.0).is_equal_to(1.0) & !constant(4.0).not_greater_than(3.0);
        assert!(both.evaluate().unwrap());
        let either = constant(1.0).is_equal_to(2.0) | constant(1.0).less_than(2.0);
        assert!(either.evaluate().unwrap());
    }

    #[test]
    fn test_evaluate_non_constant() {
        let cond = domain_index("x").greater_than(first_index("x") + 5.0);
        assert!(!cond.is_constant());
        let err = cond.evaluate().unwrap_err();
        assert_eq!(ErrorCode::NotEvaluable, err.code);
    }

    #[test]
    fn test_structure() {
        let a = domain_index("x").less_than(3.0) & domain_index("y").less_than(4.0);
        let b = domain_index("x").less_than(3.0) & domain_index("y").less_than(4.0);
        assert!(a.is_same(&b));
        assert!(!a.is_same(&(domain_index("x").less_than(3.0) | domain_index("y").less_than(4.0))));
        assert_eq!(7, a.num_nodes());
        assert!(a.depends_on("y"));
        assert!(!a.depends_on("z"));
    }
}
