// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Element storage for vars.
//!
//! Kernels only need shape queries and element access, described by
//! [`VarStorage`].  [`DenseStorage`] is a simple in-memory implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;
use tracing::debug;

use crate::ast::{IndexType, Var};
use crate::common::Result;
use crate::idiv::imod_flr;
use crate::storage_err;

/// Storage for var elements.  Writes go through `&self` so that tiles
/// running on different workers can update disjoint elements concurrently.
pub trait VarStorage: Sync {
    /// Allocate `var` with `sizes[i]` elements along dimension `i`, the
    /// first of which has index `first[i]`.  Step dimensions wrap: index `i`
    /// and `i + sizes[i]` name the same element.
    fn allocate(&mut self, var: &Var, first: &[i64], sizes: &[i64], numa_pref: i32)
    -> Result<()>;

    fn dim_sizes(&self, var: &str) -> Result<SmallVec<[i64; 4]>>;

    fn first_index(&self, var: &str, dim: &str) -> Result<i64>;

    fn get_element(&self, var: &str, indices: &[i64]) -> Result<f64>;

    fn set_element(&self, var: &str, indices: &[i64], val: f64) -> Result<()>;
}

#[derive(Debug)]
struct DenseDim {
    name: String,
    first: i64,
    size: i64,
    wrap: bool,
}

#[derive(Debug)]
struct DenseVar {
    dims: Vec<DenseDim>,
    data: Vec<AtomicU64>,
}

impl DenseVar {
    fn offset(&self, name: &str, indices: &[i64]) -> Result<usize> {
        if indices.len() != self.dims.len() {
            return storage_err!(
                OutOfBounds,
                format!(
                    "'{}' has {} dimension(s), got {} index(es)",
                    name,
                    self.dims.len(),
                    indices.len()
                )
            );
        }
        let mut offset = 0i64;
        for (dim, &idx) in self.dims.iter().zip(indices.iter()) {
            let local = if dim.wrap {
                imod_flr(idx - dim.first, dim.size)
            } else {
                idx - dim.first
            };
            if local < 0 || local >= dim.size {
                return storage_err!(
                    OutOfBounds,
                    format!(
                        "index {} of '{}' outside [{}, {})",
                        idx,
                        dim.name,
                        dim.first,
                        dim.first + dim.size
                    )
                );
            }
            offset = offset * dim.size + local;
        }
        Ok(offset as usize)
    }
}

/// Row-major in-memory storage.  Elements are kept as `f64` bit patterns in
/// atomics, so concurrent writers to distinct elements need no locking.
#[derive(Debug, Default)]
pub struct DenseStorage {
    vars: HashMap<String, DenseVar>,
}

impl DenseStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, var: &str) -> Result<&DenseVar> {
        match self.vars.get(var) {
            Some(v) => Ok(v),
            None => storage_err!(NotAllocated, format!("'{var}'")),
        }
    }

    /// Set every element of `var` to `f(indices)`.
    pub fn fill_with<F>(&self, var: &str, f: F) -> Result<()>
    where
        F: Fn(&[i64]) -> f64,
    {
        let v = self.get(var)?;
        let mut indices: SmallVec<[i64; 4]> = v.dims.iter().map(|d| d.first).collect();
        for cell in v.data.iter() {
            cell.store(f(&indices).to_bits(), Ordering::Relaxed);
            for (i, dim) in v.dims.iter().enumerate().rev() {
                indices[i] += 1;
                if indices[i] < dim.first + dim.size {
                    break;
                }
                indices[i] = dim.first;
            }
        }
        Ok(())
    }
}

impl VarStorage for DenseStorage {
    fn allocate(
        &mut self,
        var: &Var,
        first: &[i64],
        sizes: &[i64],
        numa_pref: i32,
    ) -> Result<()> {
        if first.len() != var.num_dims() || sizes.len() != var.num_dims() {
            return storage_err!(
                OutOfBounds,
                format!("'{}' has {} dimension(s)", var.name(), var.num_dims())
            );
        }
        if let Some(size) = sizes.iter().find(|s| **s <= 0) {
            return storage_err!(
                OutOfBounds,
                format!("size {} for '{}' must be positive", size, var.name())
            );
        }

        let dims: Vec<DenseDim> = var
            .dims()
            .iter()
            .zip(first.iter().zip(sizes.iter()))
            .map(|(dim, (&first, &size))| DenseDim {
                name: dim.name.clone(),
                first,
                size,
                wrap: dim.kind == IndexType::Step,
            })
            .collect();
        let len: i64 = sizes.iter().product();
        let data = (0..len).map(|_| AtomicU64::new(0f64.to_bits())).collect();
        debug!(var = var.name(), ?sizes, elements = len, numa_pref, "allocated");
        self.vars.insert(var.name().to_owned(), DenseVar { dims, data });
        Ok(())
    }

    fn dim_sizes(&self, var: &str) -> Result<SmallVec<[i64; 4]>> {
        Ok(self.get(var)?.dims.iter().map(|d| d.size).collect())
    }

    fn first_index(&self, var: &str, dim: &str) -> Result<i64> {
        match self.get(var)?.dims.iter().find(|d| d.name == dim) {
            Some(d) => Ok(d.first),
            None => storage_err!(OutOfBounds, format!("'{var}' has no dimension '{dim}'")),
        }
    }

    fn get_element(&self, var: &str, indices: &[i64]) -> Result<f64> {
        let v = self.get(var)?;
        let offset = v.offset(var, indices)?;
        Ok(f64::from_bits(v.data[offset].load(Ordering::Relaxed)))
    }

    fn set_element(&self, var: &str, indices: &[i64], val: f64) -> Result<()> {
        let v = self.get(var)?;
        let offset = v.offset(var, indices)?;
        v.data[offset].store(val.to_bits(), Ordering::Relaxed);
        Ok(())
    }
}
