// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::sync::Arc;

use float_cmp::approx_eq;

use stencil_engine::ast::{Equation, IndexExpr, IndexType, NumExpr, Var, domain_index, step_index};
use stencil_engine::{
    DenseStorage, Dimensions, KernelSettings, Scheduler, StencilKernel, TileLevel, TilePlan,
    VarStorage, VecType,
};

const SIZE: i64 = 10;
const NUM_STEPS: i64 = 4;

fn u() -> Arc<Var> {
    Var::new(
        "u",
        vec![
            IndexExpr::new("t", IndexType::Step),
            IndexExpr::new("x", IndexType::Domain),
            IndexExpr::new("y", IndexType::Domain),
        ],
    )
    .unwrap()
}

/// u(t+1, x, y) = (u(t, x, y) + u(t, x-1, y) + u(t, x+1, y) + u(t, x, y+1) + u(t, x, y-1)) / 5
fn jacobi(u: &Arc<Var>) -> Equation {
    let t = || step_index("t");
    let x = || domain_index("x");
    let y = || domain_index("y");
    let at = |dx: f64, dy: f64| {
        let xa = if dx == 0.0 { x() } else { x() + dx };
        let ya = if dy == 0.0 { y() } else { y() + dy };
        NumExpr::from(u.at(vec![t(), xa, ya]).unwrap())
    };
    let rhs = (at(0.0, 0.0) + at(-1.0, 0.0) + at(1.0, 0.0) + at(0.0, 1.0) + at(0.0, -1.0)) / 5.0;
    let lhs = u.at(vec![t() + 1.0, x(), y()]).unwrap();
    Equation::new(lhs, rhs).unwrap()
}

fn initial(x: i64, y: i64) -> f64 {
    if (0..SIZE).contains(&x) && (0..SIZE).contains(&y) {
        ((x * SIZE + y) as f64).sqrt()
    } else {
        0.0
    }
}

fn new_storage(u: &Var) -> DenseStorage {
    let mut storage = DenseStorage::new();
    storage
        .allocate(u, &[0, -1, -1], &[2, SIZE + 2, SIZE + 2], 0)
        .unwrap();
    storage
        .fill_with("u", |idx| if idx[0] == 0 { initial(idx[1], idx[2]) } else { 0.0 })
        .unwrap();
    storage
}

/// The same sweep as plain loops over a haloed grid.
fn reference() -> Vec<Vec<f64>> {
    let n = (SIZE + 2) as usize;
    let mut cur = vec![vec![0.0; n]; n];
    for x in -1..=SIZE {
        for y in -1..=SIZE {
            cur[(x + 1) as usize][(y + 1) as usize] = initial(x, y);
        }
    }
    for _ in 0..NUM_STEPS {
        let mut next = vec![vec![0.0; n]; n];
        for i in 1..n - 1 {
            for j in 1..n - 1 {
                next[i][j] = (cur[i][j] + cur[i - 1][j] + cur[i + 1][j] + cur[i][j + 1]
                    + cur[i][j - 1])
                    / 5.0;
            }
        }
        cur = next;
    }
    cur
}

fn check(storage: &DenseStorage) {
    let expected = reference();
    for x in 0..SIZE {
        for y in 0..SIZE {
            let actual = storage.get_element("u", &[NUM_STEPS, x, y]).unwrap();
            let want = expected[(x + 1) as usize][(y + 1) as usize];
            assert!(
                approx_eq!(f64, want, actual, epsilon = 1e-12),
                "u({NUM_STEPS}, {x}, {y}): expected {want}, got {actual}"
            );
        }
    }
}

fn run(settings: &KernelSettings) -> DenseStorage {
    let u = u();
    let dims = Dimensions::new("t", &["x", "y"]).unwrap();
    let kernel = StencilKernel::new(vec![jacobi(&u)], dims, settings).unwrap();
    let scheduler = Scheduler::new(settings).unwrap();
    let storage = new_storage(&u);
    kernel.run(&scheduler, &storage, 0, NUM_STEPS - 1).unwrap();
    storage
}

fn base_settings() -> KernelSettings {
    KernelSettings::default()
        .with_num_threads(4)
        .with_domain_size("x", SIZE)
        .with_domain_size("y", SIZE)
}

#[test]
fn test_jacobi_single_tile() {
    check(&run(&base_settings().with_num_threads(1)));
}

#[test]
fn test_jacobi_blocked() {
    let settings = base_settings()
        .with_region_size("x", 6)
        .with_block_size("x", 3)
        .with_block_size("y", 4)
        .with_mini_block_size("y", 2);
    check(&run(&settings));
}

#[test]
fn test_jacobi_folded() {
    let mut settings = base_settings().with_block_size("x", 4).with_mini_block_size("y", 3);
    settings.fold.insert("y".to_owned(), 4);

    let u = u();
    let dims = Dimensions::new("t", &["x", "y"]).unwrap();
    let kernel = StencilKernel::new(vec![jacobi(&u)], dims, &settings).unwrap();
    for point in kernel.equations()[0].points() {
        assert_eq!(VecType::Full, kernel.analysis().vec_type(point).unwrap());
    }
    let inner = kernel.plan().levels.last().unwrap();
    assert_eq!(vec![SIZE, 4], inner.stride);
    assert_eq!(vec![1, 4], inner.align);

    let scheduler = Scheduler::new(&settings).unwrap();
    let storage = new_storage(&u);
    kernel.run(&scheduler, &storage, 0, NUM_STEPS - 1).unwrap();
    check(&storage);
}

#[test]
fn test_jacobi_custom_plan() {
    let settings = base_settings();
    let u = u();
    let dims = Dimensions::new("t", &["x", "y"]).unwrap();
    let mut kernel = StencilKernel::new(vec![jacobi(&u)], dims, &settings).unwrap();
    kernel.set_plan(TilePlan::new(vec![
        TileLevel::new("rows", vec![0], vec![3]),
        TileLevel::new("cols", vec![1], vec![4]).with_align(vec![2], vec![1]),
    ]));

    let scheduler = Scheduler::new(&settings).unwrap();
    let storage = new_storage(&u);
    kernel.run(&scheduler, &storage, 0, NUM_STEPS - 1).unwrap();
    check(&storage);
}

#[test]
fn test_jacobi_rendering() {
    let eq = jacobi(&u());
    assert_eq!(
        "u(t+1, x, y) = (u(t, x, y) + u(t, x-1, y) + u(t, x+1, y) + u(t, x, y+1) + u(t, x, y-1)) / 5",
        eq.to_string()
    );
}
