// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use super::{IndexExpr, NumExpr, VarPoint};
use crate::analysis_err;
use crate::common::{Result, quoted};

/// Supplies the values an expression cannot compute by itself: the current
/// index along each dimension, and the contents of var points.
pub trait EvalEnv {
    fn index_value(&self, idx: &IndexExpr) -> Result<i64>;
    fn read_point(&self, point: &VarPoint, indices: &[i64]) -> Result<f64>;
}

/// The empty environment; evaluating under it succeeds only for constant
/// sub-trees.
pub struct ConstEnv;

impl EvalEnv for ConstEnv {
    fn index_value(&self, idx: &IndexExpr) -> Result<i64> {
        analysis_err!(
            NotEvaluable,
            format!(
                "cannot evaluate {} for a known numerical value",
                quoted(&idx.to_string())
            )
        )
    }

    fn read_point(&self, point: &VarPoint, _indices: &[i64]) -> Result<f64> {
        analysis_err!(
            NotEvaluable,
            format!(
                "cannot evaluate {} for a known numerical value",
                quoted(&point.to_string())
            )
        )
    }
}

pub(crate) fn to_integer(val: f64, expr: &NumExpr) -> Result<i64> {
    if !val.is_finite() || val.fract() != 0.0 || val.abs() >= 2f64.powi(63) {
        return analysis_err!(
            NotInteger,
            format!(
                "{} evaluates to {}, which is not an integer",
                quoted(&expr.to_string()),
                val
            )
        );
    }
    Ok(val as i64)
}
