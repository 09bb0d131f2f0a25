// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeMap;
use std::fmt;
use std::{error, result};

/// Ordered substitution map applied to dimension names when rendering
/// expressions, e.g. `x -> x_idx`.
pub type VarMap = BTreeMap<String, String>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError, // will never be produced
    Generic,
    // model construction
    ArgCountMismatch,
    BadLhs,
    BadVarDimension,
    DuplicateDimension,
    UnknownDimension,
    // analysis
    NotEvaluable,
    NotInteger,
    DivideByZero,
    UnknownFunction,
    BadFunctionArgs,
    AnalysisMissing,
    // scheduling
    BadDimension,
    BadStride,
    BadAlignment,
    BadPlan,
    ThreadPool,
    // storage
    OutOfBounds,
    NotAllocated,
    BadSettings,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            NoError => "no_error",
            Generic => "generic",
            ArgCountMismatch => "arg_count_mismatch",
            BadLhs => "bad_lhs",
            BadVarDimension => "bad_var_dimension",
            DuplicateDimension => "duplicate_dimension",
            UnknownDimension => "unknown_dimension",
            NotEvaluable => "not_evaluable",
            NotInteger => "not_integer",
            DivideByZero => "divide_by_zero",
            UnknownFunction => "unknown_function",
            BadFunctionArgs => "bad_function_args",
            AnalysisMissing => "analysis_missing",
            BadDimension => "bad_dimension",
            BadStride => "bad_stride",
            BadAlignment => "bad_alignment",
            BadPlan => "bad_plan",
            ThreadPool => "thread_pool",
            OutOfBounds => "out_of_bounds",
            NotAllocated => "not_allocated",
            BadSettings => "bad_settings",
        };

        write!(f, "{name}")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Model,
    Analysis,
    Schedule,
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
        }
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Model => "ModelError",
            ErrorKind::Analysis => "AnalysisError",
            ErrorKind::Schedule => "ScheduleError",
            ErrorKind::Storage => "StorageError",
        };
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", kind, self.code, details),
            None => write!(f, "{}{{{}}}", kind, self.code),
        }
    }
}

impl error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Model,
            code: ErrorCode::BadSettings,
            details: Some(err.to_string()),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Wrap a rendered expression in single quotes for error details.
pub fn quoted(s: &str) -> String {
    format!("'{s}'")
}

#[macro_export]
macro_rules! model_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Model, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Model, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! analysis_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Analysis, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Analysis, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! sched_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Schedule, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Schedule, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! storage_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Storage, ErrorCode::$code, Some($str)))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Storage, ErrorCode::$code, None))
    }};
}

#[test]
fn test_error_display() {
    let err = Error::new(
        ErrorKind::Analysis,
        ErrorCode::NotEvaluable,
        Some(quoted("x + 1")),
    );
    assert_eq!("AnalysisError{not_evaluable: 'x + 1'}", format!("{err}"));

    let err = Error::new(ErrorKind::Schedule, ErrorCode::BadStride, None);
    assert_eq!("ScheduleError{bad_stride}", format!("{err}"));
}

#[test]
fn test_error_macros() {
    let r: Result<()> = sched_err!(BadAlignment, "dim 1".to_owned());
    let err = r.unwrap_err();
    assert_eq!(ErrorKind::Schedule, err.kind);
    assert_eq!(ErrorCode::BadAlignment, err.code);
    assert_eq!(Some("dim 1".to_owned()), err.get_details());

    let r: Result<()> = model_err!(BadLhs);
    assert_eq!(ErrorKind::Model, r.unwrap_err().kind);
}
