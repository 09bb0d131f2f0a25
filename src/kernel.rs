// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Evaluation of a set of equations over the tiles of a domain.

use smallvec::SmallVec;
use tracing::{debug, info, trace};

use crate::analysis::{Analysis, Dimensions, pair_functions};
use crate::ast::{Equation, EvalEnv, IndexExpr, IndexType, VarPoint};
use crate::common::Result;
use crate::scheduler::{DimSpan, IterSpace, Scheduler, TilePlan};
use crate::settings::KernelSettings;
use crate::storage::VarStorage;
use crate::{analysis_err, model_err};

/// A set of analyzed equations plus the tiling they are evaluated with.
#[derive(Debug)]
pub struct StencilKernel {
    equations: Vec<Equation>,
    dims: Dimensions,
    analysis: Analysis,
    domain: IterSpace,
    plan: TilePlan,
}

impl StencilKernel {
    /// Flatten, pair and analyze `equations`, then derive a tile plan for
    /// the domain described by `settings`.
    pub fn new(
        mut equations: Vec<Equation>,
        mut dims: Dimensions,
        settings: &KernelSettings,
    ) -> Result<Self> {
        settings.validate()?;
        for (dim, vlen) in settings.fold.iter() {
            dims = dims.with_fold(dim, *vlen)?;
        }

        for eq in equations.iter_mut() {
            eq.flatten();
        }
        let mut analysis = Analysis::analyze(&equations, &dims)?;
        if settings.pair_functions {
            for eq in equations.iter() {
                pair_functions(eq, &mut analysis);
            }
        }

        let mut spans = vec![];
        for dim in dims.domain_dims() {
            let Some(&size) = settings.domain_sizes.get(dim) else {
                return model_err!(BadSettings, format!("no domain size for '{dim}'"));
            };
            spans.push(DimSpan::new(dim, 0, size));
        }
        let domain = IterSpace::new(spans);

        let mut plan = TilePlan::from_settings(&domain, settings);
        plan.legalize(&domain, &dims, &analysis)?;

        info!(
            equations = equations.len(),
            dims = ?dims.domain_dims(),
            levels = plan.levels.len(),
            "kernel built"
        );
        Ok(StencilKernel {
            equations,
            dims,
            analysis,
            domain,
            plan,
        })
    }

    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    pub fn dims(&self) -> &Dimensions {
        &self.dims
    }

    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    pub fn domain(&self) -> &IterSpace {
        &self.domain
    }

    pub fn plan(&self) -> &TilePlan {
        &self.plan
    }

    /// Replace the tile plan, e.g. with one built by hand.
    pub fn set_plan(&mut self, plan: TilePlan) {
        self.plan = plan;
    }

    /// Evaluate every step from `first_step` through `last_step`.  Within a
    /// step equations run in order, each over the whole domain, skipping the
    /// ones whose step condition is false.
    pub fn run<S>(
        &self,
        scheduler: &Scheduler,
        storage: &S,
        first_step: i64,
        last_step: i64,
    ) -> Result<()>
    where
        S: VarStorage + ?Sized,
    {
        for step in first_step..=last_step {
            trace!(step, "step start");
            for eq in self.equations.iter() {
                if let Some(cond) = eq.step_cond() {
                    let env = StepEnv {
                        step_dim: self.dims.step_dim(),
                        step,
                    };
                    if !cond.eval(&env)? {
                        trace!(step, equation = %eq, "skipped by step condition");
                        continue;
                    }
                }
                scheduler.run_plan(&self.plan, &self.domain, |tile| {
                    self.eval_tile(eq, tile, storage, step)
                })?;
            }
        }
        debug!(first_step, last_step, "run complete");
        Ok(())
    }

    /// Evaluate `eq` at every point of `tile`.
    fn eval_tile<S>(&self, eq: &Equation, tile: &IterSpace, storage: &S, step: i64) -> Result<()>
    where
        S: VarStorage + ?Sized,
    {
        if tile.dims.iter().any(DimSpan::is_empty) {
            return Ok(());
        }
        let mut env = PointEnv {
            step_dim: self.dims.step_dim(),
            step,
            domain: &self.domain,
            indices: tile.dims.iter().map(|d| d.start).collect(),
            storage,
        };
        loop {
            let write = match eq.cond() {
                Some(cond) => cond.eval(&env)?,
                None => true,
            };
            if write {
                let val = eq.rhs().eval(&env)?;
                let lhs = eq.lhs().eval_indices(&env)?;
                storage.set_element(eq.lhs().var_name(), &lhs, val)?;
            }

            // odometer over the tile, last dimension fastest
            let mut i = tile.dims.len();
            loop {
                if i == 0 {
                    return Ok(());
                }
                i -= 1;
                env.indices[i] += 1;
                if env.indices[i] < tile.dims[i].stop {
                    break;
                }
                env.indices[i] = tile.dims[i].start;
            }
        }
    }
}

/// Resolves only the step index, for step conditions.
struct StepEnv<'a> {
    step_dim: &'a str,
    step: i64,
}

impl EvalEnv for StepEnv<'_> {
    fn index_value(&self, idx: &IndexExpr) -> Result<i64> {
        if idx.kind == IndexType::Step && idx.name == self.step_dim {
            return Ok(self.step);
        }
        analysis_err!(
            NotEvaluable,
            format!("'{idx}' in a step condition")
        )
    }

    fn read_point(&self, point: &VarPoint, _indices: &[i64]) -> Result<f64> {
        analysis_err!(NotEvaluable, format!("'{point}' in a step condition"))
    }
}

/// Resolves indices at one point of the domain and reads vars from storage.
struct PointEnv<'a, S: ?Sized> {
    step_dim: &'a str,
    step: i64,
    domain: &'a IterSpace,
    indices: SmallVec<[i64; 4]>,
    storage: &'a S,
}

impl<S: VarStorage + ?Sized> EvalEnv for PointEnv<'_, S> {
    fn index_value(&self, idx: &IndexExpr) -> Result<i64> {
        if idx.kind == IndexType::Step {
            if idx.name == self.step_dim {
                return Ok(self.step);
            }
            return model_err!(UnknownDimension, format!("step dimension '{}'", idx.name));
        }
        let Some(pos) = self.domain.dim_pos(&idx.name) else {
            return analysis_err!(
                NotEvaluable,
                format!("'{idx}' is not a domain dimension")
            );
        };
        let span = &self.domain.dims[pos];
        Ok(match idx.kind {
            IndexType::First => span.begin,
            IndexType::Last => span.end - 1,
            _ => self.indices[pos],
        })
    }

    fn read_point(&self, point: &VarPoint, indices: &[i64]) -> Result<f64> {
        self.storage.get_element(point.var_name(), indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NumExpr, Var, constant, domain_index, first_index, last_index, step_index};
    use crate::common::ErrorCode;
    use crate::storage::DenseStorage;
    use float_cmp::approx_eq;
    use std::sync::Arc;

    fn u() -> Arc<Var> {
        Var::new(
            "u",
            vec![
                IndexExpr::new("t", IndexType::Step),
                IndexExpr::new("x", IndexType::Domain),
            ],
        )
        .unwrap()
    }

    fn settings(size: i64) -> KernelSettings {
        KernelSettings::default()
            .with_num_threads(2)
            .with_domain_size("x", size)
            .with_block_size("x", 3)
    }

    fn storage(u: &Var, size: i64) -> DenseStorage {
        let mut storage = DenseStorage::new();
        storage.allocate(u, &[0, -1], &[2, size + 2], 0).unwrap();
        storage
    }

    #[test]
    fn test_counter() {
        // u(t+1, x) = u(t, x) + x
        let u = u();
        let t = || step_index("t");
        let x = || domain_index("x");
        let lhs = u.at(vec![t() + 1.0, x()]).unwrap();
        let rhs = NumExpr::from(u.at(vec![t(), x()]).unwrap()) + x();
        let eq = Equation::new(lhs, rhs).unwrap();

        let settings = settings(8);
        let kernel = StencilKernel::new(vec![eq], Dimensions::new("t", &["x"]).unwrap(), &settings).unwrap();
        let scheduler = Scheduler::new(&settings).unwrap();
        let storage = storage(&u, 8);
        kernel.run(&scheduler, &storage, 0, 2).unwrap();

        // after steps 0, 1 and 2 the newest values live at t = 3
        for i in 0..8 {
            let val = storage.get_element("u", &[3, i]).unwrap();
            assert!(approx_eq!(f64, 3.0 * i as f64, val));
        }
    }

    #[test]
    fn test_conditions() {
        // u(t+1, x) = 1 if_domain x > FIRST_INDEX(x) + 2 && x < LAST_INDEX(x)
        //   if_step t % 2 == 1
        let u = u();
        let t = || step_index("t");
        let x = || domain_index("x");
        let lhs = u.at(vec![t() + 1.0, x()]).unwrap();
        let eq = Equation::new(lhs, constant(1.0))
            .unwrap()
            .with_cond(x().greater_than(first_index("x") + 2.0) & x().less_than(last_index("x")))
            .with_step_cond((t() % 2.0).is_equal_to(1.0));

        let settings = settings(8);
        let kernel = StencilKernel::new(vec![eq], Dimensions::new("t", &["x"]).unwrap(), &settings).unwrap();
        let scheduler = Scheduler::new(&settings).unwrap();
        let storage = storage(&u, 8);

        // step 0 is skipped, so nothing is written to t = 1
        kernel.run(&scheduler, &storage, 0, 0).unwrap();
        for i in 0..8 {
            assert!(approx_eq!(f64, 0.0, storage.get_element("u", &[1, i]).unwrap()));
        }

        kernel.run(&scheduler, &storage, 1, 1).unwrap();
        let written: Vec<i64> = (0..8)
            .filter(|&i| storage.get_element("u", &[2, i]).unwrap() > 0.5)
            .collect();
        assert_eq!(vec![3, 4, 5, 6], written);
    }

    #[test]
    fn test_missing_domain_size() {
        let u = u();
        let lhs = u.at(vec![step_index("t") + 1.0, domain_index("x")]).unwrap();
        let eq = Equation::new(lhs, constant(1.0)).unwrap();
        let err = StencilKernel::new(
            vec![eq],
            Dimensions::new("t", &["x"]).unwrap(),
            &KernelSettings::default(),
        )
        .unwrap_err();
        assert_eq!(ErrorCode::BadSettings, err.code);
    }

    #[test]
    fn test_storage_errors_propagate() {
        let u = u();
        let lhs = u.at(vec![step_index("t") + 1.0, domain_index("x")]).unwrap();
        let rhs = u.at(vec![step_index("t"), domain_index("x") + 5.0]).unwrap();
        let eq = Equation::new(lhs, rhs.into()).unwrap();
        let settings = settings(8);
        let kernel = StencilKernel::new(vec![eq], Dimensions::new("t", &["x"]).unwrap(), &settings).unwrap();
        let scheduler = Scheduler::new(&settings).unwrap();
        let err = kernel.run(&scheduler, &storage(&u, 8), 0, 0).unwrap_err();
        assert_eq!(ErrorCode::OutOfBounds, err.code);
    }
}
