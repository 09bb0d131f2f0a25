// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Tiling of an n-dimensional iteration space.
//!
//! One call to [`scan`] splits the scanned dimensions of an [`IterSpace`]
//! into aligned, strided tiles, flattens them into a single linear range and
//! hands each tile, clamped to `[begin, end)`, to a callback.  Multi-level
//! tiling is built on top of this in [`plan`].

use rayon::prelude::*;
use smallvec::SmallVec;
use tracing::{info, trace};

use crate::common::{Error, ErrorCode, ErrorKind, Result};
use crate::idiv::{ceil_idiv_flr, idiv_flr, imod_flr, round_down_flr};
use crate::sched_err;
use crate::settings::{KernelSettings, Placement};

pub mod plan;

pub use self::plan::{TileLevel, TilePlan};

/// Iteration bounds and tiling parameters along one dimension.
///
/// `begin`, `end`, `stride`, `align` and `align_ofs` are inputs; `start`,
/// `stop`, `index` and `num_tiles` are written by the scheduler for each
/// resolved tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DimSpan {
    pub name: String,
    pub begin: i64,
    pub end: i64,
    pub stride: i64,
    /// tiles start on multiples of `align` (shifted by `align_ofs`); 0 or 1
    /// means unaligned.
    pub align: i64,
    pub align_ofs: i64,
    pub start: i64,
    pub stop: i64,
    pub index: i64,
    pub num_tiles: i64,
}

impl DimSpan {
    /// A single tile covering `[begin, end)`.
    pub fn new(name: &str, begin: i64, end: i64) -> Self {
        DimSpan {
            name: name.to_owned(),
            begin,
            end,
            stride: (end - begin).max(1),
            align: 1,
            align_ofs: 0,
            start: begin,
            stop: end,
            index: 0,
            num_tiles: 1,
        }
    }

    pub fn with_stride(mut self, stride: i64) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_align(mut self, align: i64, align_ofs: i64) -> Self {
        self.align = align;
        self.align_ofs = align_ofs;
        self
    }

    /// Number of indices in the resolved tile.
    pub fn len(&self) -> i64 {
        (self.stop - self.start).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An iteration space: one [`DimSpan`] per dimension, plus the position of
/// a resolved tile within the flattened tile range of its level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IterSpace {
    pub dims: SmallVec<[DimSpan; 4]>,
    pub linear_index: i64,
    pub linear_count: i64,
}

impl IterSpace {
    pub fn new(dims: impl IntoIterator<Item = DimSpan>) -> Self {
        IterSpace {
            dims: dims.into_iter().collect(),
            linear_index: 0,
            linear_count: 1,
        }
    }

    pub fn dim_pos(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|d| d.name == name)
    }

    pub fn dim(&self, name: &str) -> Option<&DimSpan> {
        self.dims.iter().find(|d| d.name == name)
    }

    /// The space covered by this tile: each dimension's bounds become the
    /// tile's `[start, stop)`.
    pub fn narrowed(&self) -> IterSpace {
        let mut space = self.clone();
        for d in space.dims.iter_mut() {
            d.begin = d.start;
            d.end = d.stop;
        }
        space
    }

    /// Number of points in the resolved tile.
    pub fn num_points(&self) -> i64 {
        self.dims.iter().map(DimSpan::len).product()
    }
}

/// Split `linear` into per-dimension indices, row-major: the first count
/// varies slowest.
pub fn decompose(linear: i64, counts: &[i64]) -> SmallVec<[i64; 4]> {
    let mut indices: SmallVec<[i64; 4]> = SmallVec::from_elem(0, counts.len());
    let mut rest = linear;
    for (i, count) in counts.iter().enumerate().rev() {
        indices[i] = imod_flr(rest, *count);
        rest = idiv_flr(rest, *count);
    }
    indices
}

/// The tiling of one scanned dimension.
#[derive(Copy, Clone, Debug)]
struct Tiling {
    pos: usize,
    aligned_begin: i64,
    stride: i64,
    num_tiles: i64,
}

fn tilings(space: &IterSpace, dims: &[usize]) -> Result<SmallVec<[Tiling; 4]>> {
    let mut tilings = SmallVec::new();
    for (i, &pos) in dims.iter().enumerate() {
        let Some(d) = space.dims.get(pos) else {
            return sched_err!(
                BadDimension,
                format!("dimension {} of a {}-d space", pos, space.dims.len())
            );
        };
        if dims[..i].contains(&pos) {
            return sched_err!(BadDimension, format!("'{}' scanned twice", d.name));
        }
        if d.stride <= 0 {
            return sched_err!(BadStride, format!("stride {} for '{}'", d.stride, d.name));
        }
        if d.align < 0 {
            return sched_err!(BadAlignment, format!("alignment {} for '{}'", d.align, d.name));
        }

        let align = d.align.max(1);
        let adj_align = align.min(d.stride);
        let aligned_begin = round_down_flr(d.begin - d.align_ofs, adj_align) + d.align_ofs;
        // a stride past the end yields the same single tile as one reaching it
        let stride = d.stride.min((d.end - aligned_begin).max(1));
        let num_tiles = if d.end <= d.begin {
            0
        } else {
            ceil_idiv_flr(d.end - aligned_begin, stride)
        };
        tilings.push(Tiling {
            pos,
            aligned_begin,
            stride,
            num_tiles,
        });
    }
    Ok(tilings)
}

fn resolve(space: &IterSpace, tilings: &[Tiling], linear: i64, total: i64) -> IterSpace {
    let counts: SmallVec<[i64; 4]> = tilings.iter().map(|t| t.num_tiles).collect();
    let indices = decompose(linear, &counts);

    let mut tile = space.clone();
    tile.linear_index = linear;
    tile.linear_count = total;
    for (t, &i) in tilings.iter().zip(indices.iter()) {
        let d = &mut tile.dims[t.pos];
        let raw_start = t.aligned_begin + i * t.stride;
        d.start = raw_start.max(d.begin);
        d.stop = (raw_start + t.stride).min(d.end);
        d.index = i;
        d.num_tiles = t.num_tiles;
    }
    tile
}

fn prepare(space: &IterSpace, dims: &[usize]) -> Result<(SmallVec<[Tiling; 4]>, i64)> {
    let tilings = tilings(space, dims)?;
    let total = tilings.iter().map(|t| t.num_tiles).product::<i64>();
    trace!(dims = ?dims, tiles = total, "scan");
    Ok((tilings, total))
}

/// Tile the scanned `dims` (positions in `space.dims`) and call `f` on every
/// resolved tile in parallel, one tile per work item.  Dimensions that are
/// not scanned pass through unchanged.  Returns the first error `f` reports.
pub fn scan<F>(space: &IterSpace, dims: &[usize], f: F) -> Result<()>
where
    F: Fn(&IterSpace) -> Result<()> + Sync,
{
    let (tilings, total) = prepare(space, dims)?;
    (0..total as usize)
        .into_par_iter()
        .with_max_len(1)
        .try_for_each(|linear| f(&resolve(space, &tilings, linear as i64, total)))
}

/// Like [`scan`], but visits tiles one at a time in linear order.
pub fn scan_serial<F>(space: &IterSpace, dims: &[usize], mut f: F) -> Result<()>
where
    F: FnMut(&IterSpace) -> Result<()>,
{
    let (tilings, total) = prepare(space, dims)?;
    for linear in 0..total {
        f(&resolve(space, &tilings, linear, total))?;
    }
    Ok(())
}

/// A fixed-size pool of worker threads that tiles are dispatched to.
pub struct Scheduler {
    pool: rayon::ThreadPool,
    placement: Placement,
}

impl Scheduler {
    pub fn new(settings: &KernelSettings) -> Result<Self> {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("stencil-worker-{i}"));
        if settings.num_threads > 0 {
            builder = builder.num_threads(settings.num_threads);
        }
        let pool = builder.build().map_err(|err| {
            Error::new(
                ErrorKind::Schedule,
                ErrorCode::ThreadPool,
                Some(err.to_string()),
            )
        })?;
        info!(
            threads = pool.current_num_threads(),
            placement = ?settings.placement,
            "scheduler started"
        );
        Ok(Scheduler {
            pool,
            placement: settings.placement,
        })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// [`scan`] on this scheduler's workers.
    pub fn scan<F>(&self, space: &IterSpace, dims: &[usize], f: F) -> Result<()>
    where
        F: Fn(&IterSpace) -> Result<()> + Sync + Send,
    {
        self.pool.install(|| scan(space, dims, f))
    }

    /// Run every level of `plan` over `space` on this scheduler's workers.
    pub fn run_plan<F>(&self, plan: &TilePlan, space: &IterSpace, leaf: F) -> Result<()>
    where
        F: Fn(&IterSpace) -> Result<()> + Sync + Send,
    {
        self.pool.install(|| plan.run(space, &leaf))
    }
}
