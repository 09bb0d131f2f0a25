// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use smallvec::SmallVec;

use super::eval::{EvalEnv, to_integer};
use super::num::same_list;
use super::{BinaryOp, CommExpr, CommOp, IndexExpr, IndexType, NodeId, NumExpr, Var};
use crate::common::{Result, VarMap};
use crate::model_err;

/// A reference to one element of a var: the var plus one index expression
/// per dimension, e.g. `u(t+1, x, y-1)`.
///
/// On construction each argument is classified: an argument that is a
/// simple offset from its own dimension is recorded in `arg_offsets`, and a
/// constant argument in `arg_consts`.
#[derive(Debug)]
pub struct VarPoint {
    var: Arc<Var>,
    args: Vec<NumExpr>,
    offsets: BTreeMap<String, i64>,
    consts: BTreeMap<String, i64>,
    id: NodeId,
}

impl Clone for VarPoint {
    fn clone(&self) -> Self {
        VarPoint {
            var: self.var.clone(),
            args: self.args.clone(),
            offsets: self.offsets.clone(),
            consts: self.consts.clone(),
            id: NodeId::next(),
        }
    }
}

impl VarPoint {
    pub fn new(var: &Arc<Var>, args: Vec<NumExpr>) -> Result<Self> {
        if args.len() != var.num_dims() {
            return model_err!(
                ArgCountMismatch,
                format!(
                    "var '{}' has {} dimension(s) but was given {} index expression(s)",
                    var.name(),
                    var.num_dims(),
                    args.len()
                )
            );
        }

        let mut offsets = BTreeMap::new();
        let mut consts = BTreeMap::new();
        for (dim, arg) in var.dims().iter().zip(args.iter()) {
            if let Some(ofs) = arg.offset_from(&dim.name) {
                offsets.insert(dim.name.clone(), ofs);
            } else if arg.is_constant() {
                consts.insert(dim.name.clone(), arg.int_value()?);
            }
        }

        Ok(VarPoint {
            var: var.clone(),
            args,
            offsets,
            consts,
            id: NodeId::next(),
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn var(&self) -> &Arc<Var> {
        &self.var
    }

    pub fn var_name(&self) -> &str {
        self.var.name()
    }

    pub fn args(&self) -> &[NumExpr] {
        &self.args
    }

    /// Index expression used for `dim`, if the var has that dimension.
    pub fn arg(&self, dim: &str) -> Option<&NumExpr> {
        self.var.dim_pos(dim).map(|pos| &self.args[pos])
    }

    pub fn arg_offsets(&self) -> &BTreeMap<String, i64> {
        &self.offsets
    }

    pub fn arg_consts(&self) -> &BTreeMap<String, i64> {
        &self.consts
    }

    fn dim(&self, dim: &str) -> Option<(usize, &IndexExpr)> {
        let pos = self.var.dim_pos(dim)?;
        Some((pos, &self.var.dims()[pos]))
    }

    /// Replace the argument for a step or domain dimension with `dim + offset`.
    /// Returns false, leaving the point unchanged, if the var has no such
    /// dimension or it is a misc dimension.
    pub fn set_arg_offset(&mut self, dim: &str, offset: i64) -> bool {
        let (pos, idx) = match self.dim(dim) {
            Some((pos, idx)) if matches!(idx.kind, IndexType::Step | IndexType::Domain) => {
                (pos, idx.clone())
            }
            _ => return false,
        };

        let base = NumExpr::Index(idx);
        self.args[pos] = match offset {
            0 => base,
            ofs if ofs > 0 => {
                let mut sum = CommExpr::new(CommOp::Add);
                sum.append_op(base);
                sum.append_op(NumExpr::Const(ofs as f64));
                NumExpr::Comm(sum)
            }
            ofs => NumExpr::Op2(
                BinaryOp::Sub,
                Box::new(base),
                Box::new(NumExpr::Const(-ofs as f64)),
            ),
        };
        self.consts.remove(dim);
        self.offsets.insert(dim.to_owned(), offset);
        true
    }

    /// Replace the argument for `dim` with a constant.  Returns false if the
    /// var has no such dimension.
    pub fn set_arg_const(&mut self, dim: &str, val: i64) -> bool {
        let Some((pos, _)) = self.dim(dim) else {
            return false;
        };
        self.args[pos] = NumExpr::Const(val as f64);
        self.offsets.remove(dim);
        self.consts.insert(dim.to_owned(), val);
        true
    }

    /// Same var and pairwise identical index expressions.  Comparison is
    /// structural, not textual: `u(x+1)` and `u(1+x)` render alike but are
    /// not the same point.
    pub fn is_same(&self, other: &VarPoint) -> bool {
        self.var.name() == other.var.name() && same_list(&self.args, &other.args)
    }

    /// Whether both points select the same logical var: the same declared var
    /// with the same constant indices.  A var with a misc dimension indexed by
    /// constants is really several independent vars.
    pub fn is_same_logical_var(&self, other: &VarPoint) -> bool {
        Arc::ptr_eq(&self.var, &other.var) && self.consts == other.consts
    }

    /// Name of the logical var, e.g. `coef(n=4)`, or just the var's name when
    /// no index is constant.
    pub fn logical_var_str(&self, var_map: Option<&VarMap>) -> String {
        if self.consts.is_empty() {
            return self.var.name().to_owned();
        }
        let consts: Vec<String> = self
            .var
            .dims()
            .iter()
            .filter_map(|dim| {
                let val = self.consts.get(&dim.name)?;
                let name = var_map
                    .and_then(|m| m.get(&dim.name))
                    .unwrap_or(&dim.name);
                Some(format!("{name}={val}"))
            })
            .collect();
        format!("{}({})", self.var.name(), consts.join(", "))
    }

    /// Evaluate every index expression to an integer.
    pub fn eval_indices<E: EvalEnv + ?Sized>(&self, env: &E) -> Result<SmallVec<[i64; 4]>> {
        self.args
            .iter()
            .map(|arg| to_integer(arg.eval(env)?, arg))
            .collect()
    }

    pub fn render(&self, var_map: Option<&VarMap>) -> String {
        super::print::point_str(self, var_map)
    }
}

impl fmt::Display for VarPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.render(None))
    }
}

impl PartialEq for VarPoint {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl Hash for VarPoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.render(None).hash(state);
    }
}
