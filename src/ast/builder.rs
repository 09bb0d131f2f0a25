// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Constructors and operator overloads for writing equations as ordinary
//! Rust expressions, e.g. `(u.at(..)? + u.at(..)?) / 5.0`.

use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

use super::{BinaryOp, BoolExpr, CmpOp, CommExpr, CommOp, FuncCall, IndexExpr, IndexType, NumExpr};

pub fn constant(val: f64) -> NumExpr {
    NumExpr::Const(val)
}

pub fn step_index(dim: &str) -> NumExpr {
    NumExpr::Index(IndexExpr::new(dim, IndexType::Step))
}

pub fn domain_index(dim: &str) -> NumExpr {
    NumExpr::Index(IndexExpr::new(dim, IndexType::Domain))
}

pub fn misc_index(dim: &str) -> NumExpr {
    NumExpr::Index(IndexExpr::new(dim, IndexType::Misc))
}

/// First index value of domain dimension `dim`.
pub fn first_index(dim: &str) -> NumExpr {
    NumExpr::Index(IndexExpr::new(dim, IndexType::First))
}

/// Last index value of domain dimension `dim`.
pub fn last_index(dim: &str) -> NumExpr {
    NumExpr::Index(IndexExpr::new(dim, IndexType::Last))
}

pub fn code(src: &str) -> NumExpr {
    NumExpr::Code(src.to_owned())
}

pub fn call(name: &str, args: Vec<NumExpr>) -> NumExpr {
    NumExpr::Func(FuncCall::new(name, args))
}

fn commutative(op: CommOp, lhs: NumExpr, rhs: NumExpr) -> NumExpr {
    let mut expr = CommExpr::new(op);
    expr.merge_expr(lhs);
    expr.merge_expr(rhs);
    NumExpr::Comm(expr)
}

fn binary(op: BinaryOp, lhs: NumExpr, rhs: NumExpr) -> NumExpr {
    NumExpr::Op2(op, Box::new(lhs), Box::new(rhs))
}

macro_rules! num_op {
    ($trait:ident, $method:ident, $build:expr) => {
        impl $trait for NumExpr {
            type Output = NumExpr;

            fn $method(self, rhs: NumExpr) -> NumExpr {
                $build(self, rhs)
            }
        }

        impl $trait<f64> for NumExpr {
            type Output = NumExpr;

            fn $method(self, rhs: f64) -> NumExpr {
                $build(self, NumExpr::Const(rhs))
            }
        }

        impl $trait<NumExpr> for f64 {
            type Output = NumExpr;

            fn $method(self, rhs: NumExpr) -> NumExpr {
                $build(NumExpr::Const(self), rhs)
            }
        }
    };
}

num_op!(Add, add, |l, r| commutative(CommOp::Add, l, r));
num_op!(Mul, mul, |l, r| commutative(CommOp::Mul, l, r));
num_op!(Sub, sub, |l, r| binary(BinaryOp::Sub, l, r));
num_op!(Div, div, |l, r| binary(BinaryOp::Div, l, r));
num_op!(Rem, rem, |l, r| binary(BinaryOp::Mod, l, r));

impl Neg for NumExpr {
    type Output = NumExpr;

    fn neg(self) -> NumExpr {
        NumExpr::Neg(Box::new(self))
    }
}

impl NumExpr {
    fn compare(self, op: CmpOp, rhs: impl Into<NumExpr>) -> BoolExpr {
        BoolExpr::Cmp(op, Box::new(self), Box::new(rhs.into()))
    }

    pub fn is_equal_to(self, rhs: impl Into<NumExpr>) -> BoolExpr {
        self.compare(CmpOp::Eq, rhs)
    }

    pub fn not_equal_to(self, rhs: impl Into<NumExpr>) -> BoolExpr {
        self.compare(CmpOp::Neq, rhs)
    }

    pub fn less_than(self, rhs: impl Into<NumExpr>) -> BoolExpr {
        self.compare(CmpOp::Lt, rhs)
    }

    pub fn not_less_than(self, rhs: impl Into<NumExpr>) -> BoolExpr {
        self.compare(CmpOp::Gte, rhs)
    }

    pub fn greater_than(self, rhs: impl Into<NumExpr>) -> BoolExpr {
        self.compare(CmpOp::Gt, rhs)
    }

    pub fn not_greater_than(self, rhs: impl Into<NumExpr>) -> BoolExpr {
        self.compare(CmpOp::Lte, rhs)
    }
}
