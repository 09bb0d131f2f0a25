// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Symbolic model of stencil update equations.
//!
//! Numeric and boolean expressions are closed enums whose nodes own their
//! children exclusively; `clone()` is always a deep copy.  The only edge that
//! is not a tree edge is the pairing between two function calls, which lives
//! in the [`Analysis`](crate::analysis::Analysis) side table keyed by
//! [`NodeId`] rather than in the nodes themselves.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

mod bool_expr;
mod builder;
mod equation;
mod eval;
mod num;
mod print;
mod var_point;

pub use self::bool_expr::{BoolExpr, CmpOp, LogicOp};
pub use self::builder::{
    call, code, constant, domain_index, first_index, last_index, misc_index, step_index,
};
pub use self::equation::Equation;
pub use self::eval::{ConstEnv, EvalEnv};
pub use self::num::{BinaryOp, CommExpr, CommOp, FuncCall, NumExpr};
pub use self::var_point::VarPoint;

use crate::common::Result;
use crate::model_err;

/// Identity of a node that analysis results or pair links can refer to.
///
/// Ids are minted from a process-wide counter; a cloned node always gets a
/// fresh id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        NodeId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The role a dimension index plays in an equation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IndexType {
    /// the step (time) dimension.
    Step,
    /// a spatial domain dimension.
    Domain,
    /// any other dimension, e.g. a coefficient index.
    Misc,
    /// first index value of a domain dimension.
    First,
    /// last index value of a domain dimension.
    Last,
}

/// A reference to a named dimension.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexExpr {
    pub name: String,
    pub kind: IndexType,
}

impl IndexExpr {
    pub fn new(name: &str, kind: IndexType) -> Self {
        IndexExpr {
            name: name.to_owned(),
            kind,
        }
    }

    /// Whether this names the running index of `dim` (as opposed to one of
    /// its bounds).
    pub fn is_index_of(&self, dim: &str) -> bool {
        self.name == dim && !matches!(self.kind, IndexType::First | IndexType::Last)
    }
}

/// A declared multi-dimensional array: a name and its dimensions in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Var {
    name: String,
    dims: Vec<IndexExpr>,
}

impl Var {
    pub fn new(name: &str, dims: Vec<IndexExpr>) -> Result<Arc<Var>> {
        for (i, dim) in dims.iter().enumerate() {
            if matches!(dim.kind, IndexType::First | IndexType::Last) {
                return model_err!(
                    BadVarDimension,
                    format!("var '{}' declared over bound index of '{}'", name, dim.name)
                );
            }
            if dims[..i].iter().any(|d| d.name == dim.name) {
                return model_err!(
                    DuplicateDimension,
                    format!("var '{}' repeats dimension '{}'", name, dim.name)
                );
            }
        }
        Ok(Arc::new(Var {
            name: name.to_owned(),
            dims,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[IndexExpr] {
        &self.dims
    }

    pub fn num_dims(&self) -> usize {
        self.dims.len()
    }

    /// Position of `dim` in this var's dimension list.
    pub fn dim_pos(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d.name == dim)
    }

    pub fn has_step_dim(&self) -> bool {
        self.dims.iter().any(|d| d.kind == IndexType::Step)
    }

    /// Build a point in this var, one index expression per dimension.
    pub fn at(self: &Arc<Self>, args: Vec<NumExpr>) -> Result<VarPoint> {
        VarPoint::new(self, args)
    }
}
