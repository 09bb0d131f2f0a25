// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Numeric functions that may appear in equations.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::analysis_err;
use crate::common::Result;

#[derive(Copy, Clone)]
enum Builtin {
    Unary(fn(f64) -> f64),
    Binary(fn(f64, f64) -> f64),
}

impl Builtin {
    fn arity(&self) -> usize {
        match self {
            Builtin::Unary(_) => 1,
            Builtin::Binary(_) => 2,
        }
    }
}

lazy_static! {
    static ref BUILTINS: HashMap<&'static str, Builtin> = {
        use Builtin::*;
        let mut m = HashMap::new();
        m.insert("abs", Unary(f64::abs));
        m.insert("sqrt", Unary(f64::sqrt));
        m.insert("cbrt", Unary(f64::cbrt));
        m.insert("exp", Unary(f64::exp));
        m.insert("log", Unary(f64::ln));
        m.insert("log10", Unary(f64::log10));
        m.insert("sin", Unary(f64::sin));
        m.insert("cos", Unary(f64::cos));
        m.insert("tan", Unary(f64::tan));
        m.insert("asin", Unary(f64::asin));
        m.insert("acos", Unary(f64::acos));
        m.insert("atan", Unary(f64::atan));
        m.insert("floor", Unary(f64::floor));
        m.insert("ceil", Unary(f64::ceil));
        m.insert("pow", Binary(f64::powf));
        m.insert("min", Binary(f64::min));
        m.insert("max", Binary(f64::max));
        m.insert("atan2", Binary(f64::atan2));
        m
    };
}

pub fn is_builtin_fn(name: &str) -> bool {
    BUILTINS.contains_key(name)
}

/// Apply the builtin `name` to already-evaluated arguments.
pub fn apply(name: &str, args: &[f64]) -> Result<f64> {
    let Some(builtin) = BUILTINS.get(name) else {
        return analysis_err!(UnknownFunction, format!("'{name}'"));
    };
    match (builtin, args) {
        (Builtin::Unary(f), [a]) => Ok(f(*a)),
        (Builtin::Binary(f), [a, b]) => Ok(f(*a, *b)),
        _ => analysis_err!(
            BadFunctionArgs,
            format!(
                "'{}' takes {} argument(s), got {}",
                name,
                builtin.arity(),
                args.len()
            )
        ),
    }
}

/// Whether calls to `a` and `b` with identical arguments may share work,
/// e.g. `sin(x)` and `cos(x)` computed together.
pub fn is_pairable(a: &str, b: &str) -> bool {
    matches!((a, b), ("sin", "cos") | ("cos", "sin"))
}

#[test]
fn test_apply() {
    use float_cmp::approx_eq;

    assert!(approx_eq!(f64, 3.0, apply("sqrt", &[9.0]).unwrap()));
    assert!(approx_eq!(f64, 8.0, apply("pow", &[2.0, 3.0]).unwrap()));
    assert!(approx_eq!(f64, 1.0, apply("cos", &[0.0]).unwrap()));
    assert!(is_builtin_fn("atan2"));
    assert!(!is_builtin_fn("sinh"));
}

#[test]
fn test_apply_errors() {
    use crate::common::ErrorCode;

    assert_eq!(ErrorCode::UnknownFunction, apply("sinh", &[1.0]).unwrap_err().code);
    assert_eq!(ErrorCode::BadFunctionArgs, apply("sin", &[1.0, 2.0]).unwrap_err().code);
}

#[test]
fn test_is_pairable() {
    assert!(is_pairable("sin", "cos"));
    assert!(is_pairable("cos", "sin"));
    assert!(!is_pairable("sin", "sin"));
    assert!(!is_pairable("sin", "tan"));
}
