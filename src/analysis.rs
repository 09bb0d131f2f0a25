// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Passes over a set of equations that classify each var point by how it
//! can be vectorized and how it varies along the inner loop, plus the
//! function pairing pass.  Results live in a side table keyed by
//! [`NodeId`], so the expression trees themselves stay immutable once built.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};

use crate::ast::{Equation, FuncCall, IndexType, NodeId, NumExpr, VarPoint};
use crate::builtins;
use crate::common::Result;
use crate::{analysis_err, model_err};

/// The dimensions a set of equations is solved over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dimensions {
    step_dim: String,
    domain_dims: Vec<String>,
    fold: BTreeMap<String, i64>,
    inner_dim: String,
}

impl Dimensions {
    /// The last domain dimension is the inner loop dimension unless changed
    /// with [`with_inner_dim`](Self::with_inner_dim).
    pub fn new(step_dim: &str, domain_dims: &[&str]) -> Result<Self> {
        let Some(inner) = domain_dims.last() else {
            return model_err!(Generic, "at least one domain dimension is required".to_owned());
        };
        for (i, dim) in domain_dims.iter().enumerate() {
            if *dim == step_dim || domain_dims[..i].contains(dim) {
                return model_err!(DuplicateDimension, format!("'{dim}'"));
            }
        }
        Ok(Dimensions {
            step_dim: step_dim.to_owned(),
            domain_dims: domain_dims.iter().map(|d| d.to_string()).collect(),
            fold: BTreeMap::new(),
            inner_dim: inner.to_string(),
        })
    }

    /// Set the vector length of a domain dimension.
    pub fn with_fold(mut self, dim: &str, vlen: i64) -> Result<Self> {
        if !self.is_domain_dim(dim) {
            return model_err!(UnknownDimension, format!("'{dim}' is not a domain dimension"));
        }
        if vlen < 1 {
            return model_err!(Generic, format!("vector length {vlen} for '{dim}' must be positive"));
        }
        self.fold.insert(dim.to_owned(), vlen);
        Ok(self)
    }

    pub fn with_inner_dim(mut self, dim: &str) -> Result<Self> {
        if !self.is_domain_dim(dim) {
            return model_err!(UnknownDimension, format!("'{dim}' is not a domain dimension"));
        }
        self.inner_dim = dim.to_owned();
        Ok(self)
    }

    pub fn step_dim(&self) -> &str {
        &self.step_dim
    }

    pub fn domain_dims(&self) -> &[String] {
        &self.domain_dims
    }

    pub fn inner_dim(&self) -> &str {
        &self.inner_dim
    }

    pub fn is_domain_dim(&self, dim: &str) -> bool {
        self.domain_dims.iter().any(|d| d == dim)
    }

    /// Vector length along `dim`; 1 if it is not folded.
    pub fn fold_len(&self, dim: &str) -> i64 {
        self.fold.get(dim).copied().unwrap_or(1)
    }

    /// Dimensions with a vector length greater than one.
    pub fn fold_gt1(&self) -> impl Iterator<Item = (&str, i64)> {
        self.fold
            .iter()
            .filter(|(_, vlen)| **vlen > 1)
            .map(|(dim, vlen)| (dim.as_str(), *vlen))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VecType {
    /// vectorizable in every fold dimension.
    Full,
    /// vectorizable in some fold dimensions.
    Partial,
    /// not vectorizable.
    None,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LoopType {
    /// does not depend on the inner dimension.
    Invariant,
    /// only depends on the inner dimension, as an offset in its own position.
    Offset,
    /// anything else.
    Other,
}

fn vec_type(point: &VarPoint, dims: &Dimensions) -> VecType {
    let fold: Vec<(&str, i64)> = dims.fold_gt1().collect();
    // a fold dimension leaking into some other dimension's index defeats
    // vectorization outright.
    for (dim, arg) in point.var().dims().iter().zip(point.args().iter()) {
        if fold.iter().any(|(f, _)| *f != dim.name && arg.depends_on(f)) {
            return VecType::None;
        }
    }

    let mut folded = 0;
    for (dim, _) in fold.iter() {
        let Some(arg) = point.arg(dim) else {
            continue;
        };
        if arg.offset_from(dim).is_none() {
            return VecType::None;
        }
        folded += 1;
    }
    match folded {
        0 => VecType::None,
        n if n == fold.len() => VecType::Full,
        _ => VecType::Partial,
    }
}

fn loop_type(point: &VarPoint, dims: &Dimensions) -> LoopType {
    let inner = dims.inner_dim();
    let uses: Vec<(usize, &NumExpr)> = point
        .args()
        .iter()
        .enumerate()
        .filter(|(_, arg)| arg.depends_on(inner))
        .collect();
    match uses.as_slice() {
        [] => LoopType::Invariant,
        [(pos, arg)] if point.var().dim_pos(inner) == Some(*pos) && arg.offset_from(inner).is_some() => {
            LoopType::Offset
        }
        _ => LoopType::Other,
    }
}

/// Side table of per-node analysis results.
#[derive(Clone, Debug, Default)]
pub struct Analysis {
    vec_types: HashMap<NodeId, VecType>,
    loop_types: HashMap<NodeId, LoopType>,
    pairs: HashMap<NodeId, NodeId>,
}

impl Analysis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify every var point, written and read, of every equation.
    pub fn analyze(equations: &[Equation], dims: &Dimensions) -> Result<Self> {
        let mut analysis = Analysis::new();
        for eq in equations {
            analysis.analyze_equation(eq, dims)?;
        }
        debug!(
            equations = equations.len(),
            points = analysis.vec_types.len(),
            "analysis complete"
        );
        Ok(analysis)
    }

    pub fn analyze_equation(&mut self, eq: &Equation, dims: &Dimensions) -> Result<()> {
        for point in eq.points() {
            for dim in point.var().dims() {
                let known = match dim.kind {
                    IndexType::Step => dim.name == dims.step_dim(),
                    IndexType::Domain => dims.is_domain_dim(&dim.name),
                    _ => true,
                };
                if !known {
                    return model_err!(
                        UnknownDimension,
                        format!("'{}' in {}", dim.name, point)
                    );
                }
            }
            let vt = vec_type(point, dims);
            let lt = loop_type(point, dims);
            trace!(point = %point, vec_type = ?vt, loop_type = ?lt, "classified");
            self.vec_types.insert(point.id(), vt);
            self.loop_types.insert(point.id(), lt);
        }
        Ok(())
    }

    pub fn vec_type(&self, point: &VarPoint) -> Result<VecType> {
        match self.vec_types.get(&point.id()) {
            Some(vt) => Ok(*vt),
            None => analysis_err!(AnalysisMissing, format!("no vector analysis for '{point}'")),
        }
    }

    pub fn loop_type(&self, point: &VarPoint) -> Result<LoopType> {
        match self.loop_types.get(&point.id()) {
            Some(lt) => Ok(*lt),
            None => analysis_err!(AnalysisMissing, format!("no loop analysis for '{point}'")),
        }
    }

    /// Whether every point analyzed so far is fully vectorizable.
    pub fn all_full(&self) -> bool {
        self.vec_types.values().all(|vt| *vt == VecType::Full)
    }

    /// Link `a` with `other`.  Succeeds only if `other` is a different
    /// function call with the same arguments in the same order, and neither
    /// call is already paired with some third call.  Pairing two calls that
    /// are already paired with each other succeeds and changes nothing.
    pub fn make_pair(&mut self, a: &FuncCall, other: &NumExpr) -> bool {
        match other {
            NumExpr::Func(b) => self.pair_calls(a, b),
            _ => false,
        }
    }

    fn pair_calls(&mut self, a: &FuncCall, b: &FuncCall) -> bool {
        if a.id() == b.id() || !a.has_same_args(b) {
            return false;
        }
        match (self.pairs.get(&a.id()), self.pairs.get(&b.id())) {
            (None, None) => {
                self.pairs.insert(a.id(), b.id());
                self.pairs.insert(b.id(), a.id());
                true
            }
            (Some(pa), Some(pb)) => *pa == b.id() && *pb == a.id(),
            _ => false,
        }
    }

    pub fn pair_of(&self, call: &FuncCall) -> Option<NodeId> {
        self.pairs.get(&call.id()).copied()
    }

    pub fn is_paired(&self, call: &FuncCall) -> bool {
        self.pairs.contains_key(&call.id())
    }
}

/// Pair each unpaired call in `eq` with the next unpaired call to its
/// counterpart function over the same arguments, e.g. `sin(x)` with `cos(x)`.
/// Returns the number of pairs made.
pub fn pair_functions(eq: &Equation, analysis: &mut Analysis) -> usize {
    let calls = eq.func_calls();
    let mut made = 0;
    for (i, a) in calls.iter().enumerate() {
        if analysis.is_paired(a) {
            continue;
        }
        for b in calls[i + 1..].iter() {
            if analysis.is_paired(b) || !builtins::is_pairable(a.name(), b.name()) {
                continue;
            }
            if analysis.pair_calls(a, b) {
                made += 1;
                break;
            }
        }
    }
    if made > 0 {
        debug!(pairs = made, equation = %eq, "paired function calls");
    }
    made
}
