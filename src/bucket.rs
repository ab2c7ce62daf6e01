// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Block and bucket structures for Path ORAM.

use crate::{BlockId, BlockValue, BucketSize, LeafIndex, NodeIndex, OramError};
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A Path ORAM block combines a `BlockValue` with two metadata fields; its `id` and the `leaf` it is assigned to.
pub struct PathOramBlock {
    /// The caller-assigned identifier.
    pub id: BlockId,
    /// The leaf whose path the block must reside on.
    pub leaf: LeafIndex,
    /// The payload.
    pub value: BlockValue,
}

impl std::fmt::Debug for PathOramBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Payloads are elided so that logs never carry block contents.
        f.debug_struct("PathOramBlock")
            .field("id", &self.id)
            .field("leaf", &self.leaf)
            .field("len", &self.value.len())
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A Path ORAM bucket: the slot array stored at one tree node.
pub struct Bucket {
    /// The node this bucket is stored at.
    pub node_index: NodeIndex,
    /// The slots of the bucket; `None` marks an empty slot.
    pub slots: Vec<Option<PathOramBlock>>,
}

impl Bucket {
    /// Returns a bucket of `capacity` empty slots.
    pub fn empty(node_index: NodeIndex, capacity: BucketSize) -> Self {
        Self {
            node_index,
            slots: vec![None; capacity],
        }
    }

    /// Returns a bucket holding `blocks`, padded with empty slots up to `capacity`.
    ///
    /// # Errors
    ///
    /// Returns a `CapacityViolation` if there are more blocks than slots.
    pub fn with_blocks(
        node_index: NodeIndex,
        blocks: Vec<PathOramBlock>,
        capacity: BucketSize,
    ) -> Result<Self, OramError> {
        if blocks.len() > capacity {
            return Err(OramError::CapacityViolation {
                node_index,
                occupied: blocks.len(),
                capacity,
            });
        }
        let mut slots: Vec<Option<PathOramBlock>> = blocks.into_iter().map(Some).collect();
        slots.resize(capacity, None);
        Ok(Self { node_index, slots })
    }

    /// The number of occupied slots.
    pub fn occupancy(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Iterates over the occupied slots.
    pub fn blocks(&self) -> impl Iterator<Item = &PathOramBlock> {
        self.slots.iter().flatten()
    }

    /// Consumes the bucket, returning its occupied slots in slot order.
    pub fn into_blocks(self) -> impl Iterator<Item = PathOramBlock> {
        self.slots.into_iter().flatten()
    }

    /// Checks that the bucket holds no more than `capacity` blocks.
    pub fn check_capacity(&self, capacity: BucketSize) -> Result<(), OramError> {
        let occupied = self.occupancy();
        if occupied > capacity {
            return Err(OramError::CapacityViolation {
                node_index: self.node_index,
                occupied,
                capacity,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.occupancy() == 0 {
            write!(f, "Bucket::Empty({})", self.node_index)
        } else {
            f.debug_struct("Bucket")
                .field("node_index", &self.node_index)
                .field("slots", &self.slots)
                .finish()
        }
    }
}
