// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Client configuration.

use crate::{BucketSize, OramError, StashSize, TreeHeight};
use serde::{Deserialize, Serialize};

/// The parameter "Z" from the Path ORAM literature that sets the number of blocks per bucket; typical values are 3 or 4.
/// Here we adopt the more conservative setting of 4.
pub const DEFAULT_BLOCKS_PER_BUCKET: BucketSize = 4;

/// The default largest payload, in bytes, the client accepts for a write.
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 4096;

/// When no explicit threshold is configured, the stash is reported as abnormally large
/// once it holds more than this many full paths' worth of blocks.
pub const DEFAULT_STASH_WARNING_PATHS: StashSize = 2;

/// Tunable behavior of a `PathOramClient`. The tree height and bucket capacity are not
/// configured here: they are queried from the bucket store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// The largest payload, in bytes, accepted by `write`.
    pub max_block_size: usize,
    /// The stash occupancy above which each access logs a warning.
    /// `None` means `DEFAULT_STASH_WARNING_PATHS` times the number of slots on a path.
    pub stash_warning_threshold: Option<StashSize>,
    /// Whether to install the store's initial placement into the position map at startup.
    pub seed_position_map: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            stash_warning_threshold: None,
            seed_position_map: true,
        }
    }
}

impl ClientConfig {
    /// Parses a configuration from JSON. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self, OramError> {
        serde_json::from_str(json)
            .map_err(|e| OramError::InvalidConfigurationError(format!("{}", e)))
    }

    /// Returns the stash warning threshold for a tree of `height` with buckets of `capacity`.
    pub fn stash_warning_threshold_for(
        &self,
        height: TreeHeight,
        capacity: BucketSize,
    ) -> Result<StashSize, OramError> {
        if let Some(threshold) = self.stash_warning_threshold {
            return Ok(threshold);
        }
        let path_length = usize::try_from(height)? + 1;
        Ok(DEFAULT_STASH_WARNING_PATHS * path_length * capacity)
    }

    pub(crate) fn validate(&self) -> Result<(), OramError> {
        if self.max_block_size == 0 {
            return Err(OramError::InvalidConfigurationError(
                "max_block_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
