// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! The Path ORAM client: the access engine composing position map, stash and bucket store.

use crate::{
    bucket::Bucket, config::ClientConfig, database::BucketStore, position_map::PositionMap,
    stash::Stash, tree_index::TreeGeometry, BlockId, BlockValue, BucketSize, LeafIndex, Operation,
    Oram, OramError, StashSize,
};
use rand::{CryptoRng, RngCore};

/// A Path ORAM client.
///
/// ## Parameters
///
/// - Store `S`: the untrusted [`BucketStore`] holding the tree. Its height and bucket
///     capacity are queried once, at construction, and never change afterwards.
/// - Randomness `R`: the source of fresh leaves. It must be cryptographically secure;
///     the unlinkability of repeated accesses rests entirely on it.
///
/// ## Security
///
/// Every access, whether a read or a write, and whether or not the block exists,
/// reads the `height + 1` buckets on one path and then rewrites the same buckets.
/// The path is the one the block was assigned to on its previous access, and the block
/// is immediately reassigned to a fresh uniformly random leaf, so the sequence of paths
/// seen by the store is a sequence of independent uniform draws.
///
/// Blocks that cannot be written back are kept in the stash. The stash is small with
/// high probability for `Z >= 4`; an abnormally large stash is logged as a warning,
/// since it points at a tree too small for the number of blocks stored.
///
/// ## Failures
///
/// An access that fails after it has started mutating the position map leaves the
/// client state inconsistent with the store. The client then refuses every further
/// access with `IncompleteAccess`; it must be dropped and rebuilt.
#[derive(Debug)]
pub struct PathOramClient<S: BucketStore, R: RngCore + CryptoRng> {
    /// The untrusted store that the client obliviously accesses.
    store: S,
    rng: R,
    geometry: TreeGeometry,
    capacity: BucketSize,
    position_map: PositionMap,
    stash: Stash,
    config: ClientConfig,
    stash_warning_threshold: StashSize,
    poisoned: bool,
}

impl<S: BucketStore, R: RngCore + CryptoRng> PathOramClient<S, R> {
    /// Returns a client for `store` with the default [`ClientConfig`].
    pub fn new(store: S, rng: R) -> Result<Self, OramError> {
        Self::new_with_config(store, rng, ClientConfig::default())
    }

    /// Returns a client for `store`, configured by asking the store for its tree height
    /// and bucket capacity, and, if `config.seed_position_map` is set, its initial placement.
    ///
    /// # Errors
    ///
    /// - `InvalidConfigurationError` if `config` is unusable, the reported capacity is 0,
    ///     or the reported height is too large.
    /// - Any error raised by the store while answering.
    pub fn new_with_config(mut store: S, rng: R, config: ClientConfig) -> Result<Self, OramError> {
        config.validate()?;

        let height = store.tree_height()?;
        let capacity = store.bucket_capacity()?;
        if capacity == 0 {
            return Err(OramError::InvalidConfigurationError(
                "bucket store reported a bucket capacity of 0".into(),
            ));
        }
        let geometry = TreeGeometry::new(height)?;

        log::info!(
            "PathOramClient::new(height = {}, Z = {}, max block size = {})",
            height,
            capacity,
            config.max_block_size
        );

        let mut position_map = PositionMap::new();
        if config.seed_position_map {
            let entries = store.initial_position_map()?;
            position_map.seed(entries, &geometry)?;
        }

        let stash_warning_threshold = config.stash_warning_threshold_for(height, capacity)?;

        Ok(Self {
            store,
            rng,
            geometry,
            capacity,
            position_map,
            stash: Stash::new(),
            config,
            stash_warning_threshold,
            poisoned: false,
        })
    }

    /// The geometry of the tree.
    pub fn geometry(&self) -> &TreeGeometry {
        &self.geometry
    }

    /// The number of slots per bucket.
    pub fn bucket_capacity(&self) -> BucketSize {
        self.capacity
    }

    /// The number of blocks currently held in the stash.
    pub fn stash_occupancy(&self) -> StashSize {
        self.stash.occupancy()
    }

    /// Returns the leaf `id` is currently assigned to, if it has ever been accessed.
    pub fn position_of(&self, id: BlockId) -> Option<LeafIndex> {
        self.position_map.lookup(id)
    }

    /// The stash.
    pub fn stash(&self) -> &Stash {
        &self.stash
    }

    /// The bucket store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether an earlier access failed part-way, making the client unusable.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn access_path(&mut self, op: Operation, id: BlockId) -> Result<Option<BlockValue>, OramError> {
        // The fresh leaf doubles as the leaf to read for a never-seen id.
        let new_leaf = self.geometry.random_leaf(&mut self.rng);
        let leaf = self.position_map.lookup(id).unwrap_or(new_leaf);
        self.position_map.assign(id, new_leaf);

        for level in 0..=self.geometry.height() {
            let node = self.geometry.node_on_path(leaf, level)?;
            let bucket = self.store.read_bucket(node)?;
            if bucket.node_index != node {
                return Err(OramError::ProtocolError(format!(
                    "asked for bucket {} but received bucket {}",
                    node, bucket.node_index
                )));
            }
            self.stash
                .drain_bucket_into_stash(bucket, &self.geometry, self.capacity)?;
        }

        let result = match op {
            Operation::Read => {
                if self.stash.reassign(id, new_leaf)? {
                    self.stash.find(id)?.cloned()
                } else {
                    None
                }
            }
            Operation::Write(value) => {
                self.stash.upsert(id, new_leaf, value)?;
                None
            }
        };

        // Evict from the leaf up, so that each block settles as deep as its path allows.
        for level in (0..=self.geometry.height()).rev() {
            let node = self.geometry.node_on_path(leaf, level)?;
            let blocks = self
                .stash
                .take_for_bucket(&self.geometry, node, level, self.capacity)?;
            if blocks.len() > self.capacity {
                return Err(OramError::CapacityViolation {
                    node_index: node,
                    occupied: blocks.len(),
                    capacity: self.capacity,
                });
            }
            self.store
                .write_bucket(Bucket::with_blocks(node, blocks, self.capacity)?)?;
        }

        let stash_occupancy = self.stash.occupancy();
        if stash_occupancy > self.stash_warning_threshold {
            log::warn!(
                "Stash holds {} blocks, above the threshold of {}; the tree may be too small",
                stash_occupancy,
                self.stash_warning_threshold
            );
        } else {
            log::debug!("Access complete; stash holds {} blocks", stash_occupancy);
        }

        Ok(result)
    }
}

impl<S: BucketStore, R: RngCore + CryptoRng> Oram for PathOramClient<S, R> {
    fn access(&mut self, op: Operation, id: BlockId) -> Result<Option<BlockValue>, OramError> {
        if self.poisoned {
            return Err(OramError::IncompleteAccess);
        }

        if let Operation::Write(value) = &op {
            if value.len() > self.config.max_block_size {
                return Err(OramError::BlockTooLarge {
                    len: value.len(),
                    max: self.config.max_block_size,
                });
            }
        }

        self.access_path(op, id).map_err(|e| {
            log::error!("Access failed part-way; the client is no longer usable: {}", e);
            self.poisoned = true;
            e
        })
    }
}
