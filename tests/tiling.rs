// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeMap;
use std::sync::Mutex;

use proptest::prelude::*;

use stencil_engine::scheduler::{decompose, scan, scan_serial};
use stencil_engine::{DimSpan, IterSpace, KernelSettings, Scheduler, TileLevel, TilePlan};

/// Count how often each point of a 2-d space is handed to the leaf.
fn coverage(plan: &TilePlan, space: &IterSpace) -> BTreeMap<(i64, i64), usize> {
    let seen = Mutex::new(BTreeMap::new());
    plan.run(space, &|tile: &IterSpace| {
        let mut seen = seen.lock().unwrap();
        for x in tile.dims[0].start..tile.dims[0].stop {
            for y in tile.dims[1].start..tile.dims[1].stop {
                *seen.entry((x, y)).or_insert(0) += 1;
            }
        }
        Ok(())
    })
    .unwrap();
    seen.into_inner().unwrap()
}

fn assert_exact_cover(space: &IterSpace, seen: &BTreeMap<(i64, i64), usize>) {
    let (xs, ys) = (&space.dims[0], &space.dims[1]);
    assert_eq!(space.num_points() as usize, seen.len());
    for x in xs.begin..xs.end {
        for y in ys.begin..ys.end {
            assert_eq!(Some(&1), seen.get(&(x, y)), "point ({x}, {y})");
        }
    }
}

#[test]
fn test_one_dim_partition() {
    let space = IterSpace::new([DimSpan::new("x", 0, 10).with_stride(3)]);
    let spans = Mutex::new(vec![]);
    scan(&space, &[0], |tile: &IterSpace| {
        let d = &tile.dims[0];
        spans.lock().unwrap().push((d.index, d.start, d.stop, d.num_tiles));
        Ok(())
    })
    .unwrap();
    let mut spans = spans.into_inner().unwrap();
    spans.sort();
    assert_eq!(
        vec![(0, 0, 3, 4), (1, 3, 6, 4), (2, 6, 9, 4), (3, 9, 10, 4)],
        spans
    );
}

#[test]
fn test_aligned_first_tile_is_clipped() {
    let space = IterSpace::new([DimSpan::new("x", 5, 12).with_stride(3).with_align(3, 0)]);
    let mut spans = vec![];
    scan_serial(&space, &[0], |tile: &IterSpace| {
        spans.push((tile.dims[0].start, tile.dims[0].stop));
        Ok(())
    })
    .unwrap();
    assert_eq!(vec![(5, 6), (6, 9), (9, 12)], spans);
}

#[test]
fn test_linear_order() {
    let space = IterSpace::new([
        DimSpan::new("x", 0, 4).with_stride(2),
        DimSpan::new("y", 0, 3),
    ]);
    let mut seen = vec![];
    scan_serial(&space, &[0, 1], |tile: &IterSpace| {
        assert_eq!(2, tile.linear_count);
        seen.push((tile.linear_index, tile.dims[0].start));
        Ok(())
    })
    .unwrap();
    assert_eq!(vec![(0, 0), (1, 2)], seen);
}

#[test]
fn test_scheduler_pool() {
    let settings = KernelSettings::default().with_num_threads(3);
    let scheduler = Scheduler::new(&settings).unwrap();
    assert_eq!(3, scheduler.num_threads());

    let space = IterSpace::new([DimSpan::new("x", 0, 7), DimSpan::new("y", 0, 5)]);
    let plan = TilePlan::new(vec![TileLevel::new("block", vec![0, 1], vec![2, 2])]);
    let seen = Mutex::new(BTreeMap::new());
    scheduler
        .run_plan(&plan, &space, |tile: &IterSpace| {
            let mut seen = seen.lock().unwrap();
            for x in tile.dims[0].start..tile.dims[0].stop {
                for y in tile.dims[1].start..tile.dims[1].stop {
                    *seen.entry((x, y)).or_insert(0) += 1;
                }
            }
            Ok(())
        })
        .unwrap();
    assert_exact_cover(&space, &seen.into_inner().unwrap());
}

#[test]
fn test_empty_dimension() {
    let space = IterSpace::new([DimSpan::new("x", 3, 3), DimSpan::new("y", 0, 4)]);
    let mut calls = 0;
    scan_serial(&space, &[0, 1], |_: &IterSpace| {
        calls += 1;
        Ok(())
    })
    .unwrap();
    assert_eq!(0, calls);
}

fn span() -> impl Strategy<Value = (i64, i64)> {
    (-20i64..20, 0i64..25).prop_map(|(begin, len)| (begin, begin + len))
}

fn level() -> impl Strategy<Value = (i64, i64, i64, i64, i64, i64, bool)> {
    (1i64..9, 1i64..9, 0i64..5, 0i64..5, -3i64..4, -3i64..4, any::<bool>())
}

proptest! {
    #[test]
    fn prop_decompose_round_trip(counts in prop::collection::vec(1i64..6, 1..4), seed in 0i64..1000) {
        let total: i64 = counts.iter().product();
        let linear = seed % total;
        let indices = decompose(linear, &counts);
        let mut rebuilt = 0;
        for (i, count) in indices.iter().zip(counts.iter()) {
            prop_assert!(*i >= 0 && i < count);
            rebuilt = rebuilt * count + i;
        }
        prop_assert_eq!(linear, rebuilt);
    }

    #[test]
    fn prop_plans_cover_every_point_once(
        xs in span(),
        ys in span(),
        levels in prop::collection::vec(level(), 0..4),
    ) {
        let space = IterSpace::new([DimSpan::new("x", xs.0, xs.1), DimSpan::new("y", ys.0, ys.1)]);
        let levels = levels
            .into_iter()
            .enumerate()
            .map(|(i, (sx, sy, ax, ay, ox, oy, parallel))| {
                let lvl = TileLevel::new(&format!("l{i}"), vec![0, 1], vec![sx, sy])
                    .with_align(vec![ax, ay], vec![ox, oy]);
                if parallel { lvl } else { lvl.serial() }
            })
            .collect();
        let plan = TilePlan::new(levels);
        let seen = coverage(&plan, &space);
        if space.num_points() == 0 {
            prop_assert!(seen.is_empty());
        } else {
            assert_exact_cover(&space, &seen);
        }
    }
}
