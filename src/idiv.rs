// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Integer division rounding toward negative infinity, as tile and
//! alignment arithmetic needs for negative indices.

/// `floor(a / b)`.  `b` must be non-zero.
pub fn idiv_flr(a: i64, b: i64) -> i64 {
    a.div_euclid(b) - if b < 0 && a.rem_euclid(b) != 0 { 1 } else { 0 }
}

/// `a - b * floor(a / b)`: the remainder takes the sign of `b`.
pub fn imod_flr(a: i64, b: i64) -> i64 {
    a - b * idiv_flr(a, b)
}

/// Largest multiple of `m` not greater than `a`.
pub fn round_down_flr(a: i64, m: i64) -> i64 {
    idiv_flr(a, m) * m
}

/// Largest multiple of `m` not less than `a`, for positive `m`.
pub fn round_up_flr(a: i64, m: i64) -> i64 {
    let down = round_down_flr(a, m);
    if down == a { down } else { down + m }
}

/// `ceil(a / b)`.  `b` must be non-zero.
pub fn ceil_idiv_flr(a: i64, b: i64) -> i64 {
    let q = idiv_flr(a, b);
    if imod_flr(a, b) == 0 { q } else { q + 1 }
}
