// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Symbolic stencil equations over a step dimension and a set of domain
//! dimensions, plus a hierarchical tile scheduler that evaluates them on a
//! pool of worker threads.

#![forbid(unsafe_code)]

pub mod common;

pub mod analysis;
pub mod ast;
pub mod builtins;
pub mod idiv;
pub mod kernel;
pub mod scheduler;
pub mod settings;
pub mod storage;

pub use self::analysis::{Analysis, Dimensions, LoopType, VecType, pair_functions};
pub use self::common::{Error, ErrorCode, ErrorKind, Result, VarMap};
pub use self::kernel::StencilKernel;
pub use self::scheduler::{DimSpan, IterSpace, Scheduler, TileLevel, TilePlan};
pub use self::settings::{KernelSettings, Placement};
pub use self::storage::{DenseStorage, VarStorage};
