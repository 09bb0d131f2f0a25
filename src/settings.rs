// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::Result;
use crate::model_err;

/// How worker threads should be spread across cores.  The thread pool has
/// no affinity control, so this is recorded and logged only.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    #[default]
    Spread,
    Close,
}

/// Settings for building and running a stencil kernel.
///
/// Tile sizes are keyed by domain dimension name.  A size that is absent or
/// zero means the whole extent of the domain along that dimension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelSettings {
    /// Worker threads; 0 picks one per logical CPU.
    pub num_threads: usize,
    pub placement: Placement,

    /// Extent of the domain along each domain dimension, starting at 0.
    pub domain_sizes: BTreeMap<String, i64>,
    /// Outermost tile level, scanned serially.
    pub region_sizes: BTreeMap<String, i64>,
    /// Tiles dispatched to worker threads.
    pub block_sizes: BTreeMap<String, i64>,
    /// Innermost tile level, scanned serially within a block.
    pub mini_block_sizes: BTreeMap<String, i64>,

    /// Vector length along each folded dimension.
    pub fold: BTreeMap<String, i64>,
    /// Pair calls like `sin(x)` and `cos(x)` during analysis.
    pub pair_functions: bool,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            num_threads: 0,
            placement: Placement::Spread,
            domain_sizes: BTreeMap::new(),
            region_sizes: BTreeMap::new(),
            block_sizes: BTreeMap::new(),
            mini_block_sizes: BTreeMap::new(),
            fold: BTreeMap::new(),
            pair_functions: true,
        }
    }
}

impl KernelSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: KernelSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_domain_size(mut self, dim: &str, size: i64) -> Self {
        self.domain_sizes.insert(dim.to_owned(), size);
        self
    }

    pub fn with_block_size(mut self, dim: &str, size: i64) -> Self {
        self.block_sizes.insert(dim.to_owned(), size);
        self
    }

    pub fn with_region_size(mut self, dim: &str, size: i64) -> Self {
        self.region_sizes.insert(dim.to_owned(), size);
        self
    }

    pub fn with_mini_block_size(mut self, dim: &str, size: i64) -> Self {
        self.mini_block_sizes.insert(dim.to_owned(), size);
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Reject negative sizes and non-positive vector lengths.
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("domain", &self.domain_sizes),
            ("region", &self.region_sizes),
            ("block", &self.block_sizes),
            ("mini_block", &self.mini_block_sizes),
        ];
        for (level, sizes) in sizes {
            for (dim, size) in sizes.iter() {
                if *size < 0 {
                    return model_err!(
                        BadSettings,
                        format!("{level} size {size} for '{dim}' is negative")
                    );
                }
            }
        }
        for (dim, vlen) in self.fold.iter() {
            if *vlen < 1 {
                return model_err!(
                    BadSettings,
                    format!("vector length {vlen} for '{dim}' must be positive")
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;

    #[test]
    fn test_from_json() {
        let settings = KernelSettings::from_json(
            r#"{
                "num_threads": 4,
                "placement": "close",
                "domain_sizes": {"x": 64, "y": 32},
                "block_sizes": {"x": 16},
                "fold": {"y": 4}
            }"#,
        )
        .unwrap();
        assert_eq!(4, settings.num_threads);
        assert_eq!(Placement::Close, settings.placement);
        assert_eq!(Some(&64), settings.domain_sizes.get("x"));
        assert_eq!(Some(&16), settings.block_sizes.get("x"));
        assert!(settings.region_sizes.is_empty());
        assert!(settings.pair_functions);
    }

    #[test]
    fn test_defaults_round_trip() {
        let settings = KernelSettings::default().with_domain_size("x", 10);
        let json = settings.to_json().unwrap();
        assert_eq!(settings, KernelSettings::from_json(&json).unwrap());
        assert_eq!(KernelSettings::default(), KernelSettings::from_json("{}").unwrap());
    }

    #[test]
    fn test_bad_settings() {
        let err = KernelSettings::from_json(r#"{"block_sizes": {"x": -1}}"#).unwrap_err();
        assert_eq!(ErrorCode::BadSettings, err.code);
        let err = KernelSettings::from_json(r#"{"fold": {"x": 0}}"#).unwrap_err();
        assert_eq!(ErrorCode::BadSettings, err.code);
        let err = KernelSettings::from_json("{\"num_threads\": \"many\"}").unwrap_err();
        assert_eq!(ErrorCode::BadSettings, err.code);
    }
}
