// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeMap;

use tracing::debug;

use super::{IterSpace, scan, scan_serial};
use crate::analysis::{Analysis, Dimensions};
use crate::common::Result;
use crate::idiv::round_up_flr;
use crate::sched_err;
use crate::settings::KernelSettings;

/// One nesting level of a tiling: which dimensions it scans and the tile
/// stride and alignment along each, indexed like `dims`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileLevel {
    pub name: String,
    /// scanned positions in the iteration space.
    pub dims: Vec<usize>,
    pub stride: Vec<i64>,
    pub align: Vec<i64>,
    pub align_ofs: Vec<i64>,
    /// dispatch tiles to the worker pool rather than visiting them in order.
    pub parallel: bool,
}

impl TileLevel {
    /// An unaligned, parallel level.
    pub fn new(name: &str, dims: Vec<usize>, stride: Vec<i64>) -> Self {
        let n = dims.len();
        TileLevel {
            name: name.to_owned(),
            dims,
            stride,
            align: vec![1; n],
            align_ofs: vec![0; n],
            parallel: true,
        }
    }

    pub fn with_align(mut self, align: Vec<i64>, align_ofs: Vec<i64>) -> Self {
        self.align = align;
        self.align_ofs = align_ofs;
        self
    }

    pub fn serial(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// `space` with this level's tiling parameters filled in.
    fn configure(&self, space: &IterSpace) -> Result<IterSpace> {
        let n = self.dims.len();
        if self.stride.len() != n || self.align.len() != n || self.align_ofs.len() != n {
            return sched_err!(
                BadPlan,
                format!("level '{}' has mismatched parameter lists", self.name)
            );
        }
        let mut space = space.clone();
        for (i, &pos) in self.dims.iter().enumerate() {
            let Some(d) = space.dims.get_mut(pos) else {
                return sched_err!(
                    BadDimension,
                    format!("level '{}' scans dimension {}", self.name, pos)
                );
            };
            d.stride = self.stride[i];
            d.align = self.align[i];
            d.align_ofs = self.align_ofs[i];
        }
        Ok(space)
    }
}

/// Nested tile levels, outermost first.  Each level tiles the tile handed
/// down by the level above it; the innermost level's tiles go to the leaf.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TilePlan {
    pub levels: Vec<TileLevel>,
}

impl TilePlan {
    pub fn new(levels: Vec<TileLevel>) -> Self {
        TilePlan { levels }
    }

    /// A region, block and mini-block level over every dimension of
    /// `space`, sized from `settings`.  Regions and mini-blocks are visited
    /// serially; blocks are dispatched to workers.
    pub fn from_settings(space: &IterSpace, settings: &KernelSettings) -> Self {
        let level = |name: &str, sizes: &BTreeMap<String, i64>| {
            let dims: Vec<usize> = (0..space.dims.len()).collect();
            let stride = space
                .dims
                .iter()
                .map(|d| match sizes.get(&d.name) {
                    Some(&size) if size > 0 => size,
                    _ => (d.end - d.begin).max(1),
                })
                .collect();
            TileLevel::new(name, dims, stride)
        };
        TilePlan::new(vec![
            level("region", &settings.region_sizes).serial(),
            level("block", &settings.block_sizes),
            level("mini_block", &settings.mini_block_sizes).serial(),
        ])
    }

    /// Make the innermost level's tiles whole vectors: along every fold
    /// dimension its stride is rounded up to a multiple of the vector length,
    /// and tiles are aligned to the vector length when every analyzed point
    /// is fully vectorizable.
    pub fn legalize(
        &mut self,
        space: &IterSpace,
        dims: &Dimensions,
        analysis: &Analysis,
    ) -> Result<()> {
        let all_full = analysis.all_full();
        let Some(inner) = self.levels.last_mut() else {
            return Ok(());
        };
        for (dim, vlen) in dims.fold_gt1() {
            let Some(pos) = space.dim_pos(dim) else {
                return sched_err!(BadDimension, format!("fold dimension '{dim}'"));
            };
            let Some(i) = inner.dims.iter().position(|&d| d == pos) else {
                continue;
            };
            if i >= inner.stride.len() || i >= inner.align.len() {
                return sched_err!(BadPlan, format!("level '{}' is malformed", inner.name));
            }
            let span = &space.dims[pos];
            let extent = (span.end - span.begin).max(1);
            let stride = round_up_flr(inner.stride[i].clamp(1, extent), vlen);
            let align = if all_full { vlen } else { 1 };
            debug!(
                level = %inner.name,
                dim,
                vlen,
                from = inner.stride[i],
                stride,
                align,
                "legalized tile"
            );
            inner.stride[i] = stride;
            inner.align[i] = align;
        }
        Ok(())
    }

    /// Tile `space` level by level and call `leaf` on every innermost tile.
    /// With no levels the leaf gets `space` itself.
    pub fn run<F>(&self, space: &IterSpace, leaf: &F) -> Result<()>
    where
        F: Fn(&IterSpace) -> Result<()> + Sync,
    {
        self.run_level(0, space, leaf)
    }

    fn run_level<F>(&self, level: usize, space: &IterSpace, leaf: &F) -> Result<()>
    where
        F: Fn(&IterSpace) -> Result<()> + Sync,
    {
        let Some(lvl) = self.levels.get(level) else {
            return leaf(space);
        };
        let configured = lvl.configure(space)?;
        let body = |tile: &IterSpace| {
            if level + 1 == self.levels.len() {
                leaf(tile)
            } else {
                self.run_level(level + 1, &tile.narrowed(), leaf)
            }
        };
        if lvl.parallel {
            scan(&configured, &lvl.dims, body)
        } else {
            scan_serial(&configured, &lvl.dims, body)
        }
    }
}
