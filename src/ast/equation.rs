// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::mem;
use std::sync::Arc;

use super::{BoolExpr, FuncCall, IndexType, NumExpr, Var, VarPoint};
use crate::common::{Result, VarMap};
use crate::model_err;

/// One update rule: `lhs = rhs`, optionally restricted to the part of the
/// domain where `cond` holds and to the steps where `step_cond` holds.
#[derive(Clone, Debug)]
pub struct Equation {
    lhs: VarPoint,
    rhs: NumExpr,
    cond: Option<BoolExpr>,
    step_cond: Option<BoolExpr>,
}

impl Equation {
    /// The left-hand side must index every domain dimension with exactly its
    /// running index, the step dimension with an offset from the step index,
    /// and every misc dimension with an integer constant.
    pub fn new(lhs: VarPoint, rhs: NumExpr) -> Result<Self> {
        for (dim, arg) in lhs.var().dims().iter().zip(lhs.args().iter()) {
            let ok = match dim.kind {
                IndexType::Domain => arg.offset_from(&dim.name) == Some(0),
                IndexType::Step => arg.offset_from(&dim.name).is_some(),
                IndexType::Misc => lhs.arg_consts().contains_key(&dim.name),
                IndexType::First | IndexType::Last => false,
            };
            if !ok {
                return model_err!(
                    BadLhs,
                    format!(
                        "index '{}' of dimension '{}' cannot be written in '{}'",
                        arg,
                        dim.name,
                        lhs
                    )
                );
            }
        }

        Ok(Equation {
            lhs,
            rhs,
            cond: None,
            step_cond: None,
        })
    }

    pub fn lhs(&self) -> &VarPoint {
        &self.lhs
    }

    pub fn rhs(&self) -> &NumExpr {
        &self.rhs
    }

    pub fn var(&self) -> &Arc<Var> {
        self.lhs.var()
    }

    pub fn cond(&self) -> Option<&BoolExpr> {
        self.cond.as_ref()
    }

    pub fn set_cond(&mut self, cond: Option<BoolExpr>) {
        self.cond = cond;
    }

    pub fn step_cond(&self) -> Option<&BoolExpr> {
        self.step_cond.as_ref()
    }

    pub fn set_step_cond(&mut self, step_cond: Option<BoolExpr>) {
        self.step_cond = step_cond;
    }

    pub fn with_cond(mut self, cond: BoolExpr) -> Self {
        self.cond = Some(cond);
        self
    }

    pub fn with_step_cond(mut self, step_cond: BoolExpr) -> Self {
        self.step_cond = Some(step_cond);
        self
    }

    pub fn is_same(&self, other: &Equation) -> bool {
        fn same_cond(a: Option<&BoolExpr>, b: Option<&BoolExpr>) -> bool {
            match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => a.is_same(b),
                _ => false,
            }
        }
        self.lhs.is_same(&other.lhs)
            && self.rhs.is_same(&other.rhs)
            && same_cond(self.cond(), other.cond())
            && same_cond(self.step_cond(), other.step_cond())
    }

    pub fn num_nodes(&self) -> usize {
        1 + self.lhs.args().iter().map(NumExpr::num_nodes).sum::<usize>()
            + 1
            + self.rhs.num_nodes()
            + self.cond.as_ref().map_or(0, BoolExpr::num_nodes)
            + self.step_cond.as_ref().map_or(0, BoolExpr::num_nodes)
    }

    /// Merge nested commutative expressions throughout the right-hand side
    /// and conditions.
    pub fn flatten(&mut self) {
        let rhs = mem::replace(&mut self.rhs, NumExpr::Const(0.0));
        self.rhs = rhs.flatten();
        self.cond = self.cond.take().map(BoolExpr::flatten);
        self.step_cond = self.step_cond.take().map(BoolExpr::flatten);
    }

    /// Every var point read by this equation, in pre-order: the right-hand
    /// side first, then the conditions.
    pub fn input_points(&self) -> Vec<&VarPoint> {
        let mut points = self.rhs.points();
        for cond in [self.cond.as_ref(), self.step_cond.as_ref()].into_iter().flatten() {
            cond.walk_num(&mut |e| {
                if let NumExpr::Point(p) = e {
                    points.push(p);
                }
            });
        }
        points
    }

    /// Every var point in this equation, the written point first.
    pub fn points(&self) -> Vec<&VarPoint> {
        let mut points = vec![&self.lhs];
        points.extend(self.input_points());
        points
    }

    pub fn func_calls(&self) -> Vec<&FuncCall> {
        self.rhs.func_calls()
    }

    pub fn render(&self, var_map: Option<&VarMap>) -> String {
        let mut out = format!("{} = {}", self.lhs.render(var_map), self.rhs.render(var_map));
        if let Some(cond) = &self.cond {
            out.push_str(&format!(" if_domain {}", cond.render(var_map)));
        }
        if let Some(cond) = &self.step_cond {
            out.push_str(&format!(" if_step {}", cond.render(var_map)));
        }
        out
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.render(None))
    }
}
