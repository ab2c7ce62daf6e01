// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! The client-held Path ORAM stash.

use crate::{
    bucket::{Bucket, PathOramBlock},
    tree_index::TreeGeometry,
    BlockId, BlockValue, BucketSize, LeafIndex, NodeIndex, OramError, StashSize, TreeHeight,
};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

/// Blocks that are not currently resident in any bucket, kept in arrival order.
///
/// Lookups by id scan the whole stash and compare ids in constant time,
/// so the time they take depends only on the stash size.
#[derive(Debug, Default)]
pub struct Stash {
    blocks: Vec<PathOramBlock>,
}

impl Stash {
    /// Returns an empty stash.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves every block of `bucket` into the stash. The bucket is thereafter
    /// logically empty; it is rewritten in full during write-back.
    /// Nothing is moved unless the whole bucket is well formed.
    ///
    /// # Errors
    ///
    /// - `CapacityViolation` if the bucket holds more than `capacity` blocks.
    /// - `ProtocolError` if a block carries a leaf outside `geometry`, or is already in the stash.
    pub fn drain_bucket_into_stash(
        &mut self,
        bucket: Bucket,
        geometry: &TreeGeometry,
        capacity: BucketSize,
    ) -> Result<(), OramError> {
        bucket.check_capacity(capacity)?;
        let node_index = bucket.node_index;
        for block in bucket.blocks() {
            if geometry.check_leaf(block.leaf).is_err() {
                return Err(OramError::ProtocolError(format!(
                    "block {} in bucket {} carries leaf {} outside the tree",
                    block.id, node_index, block.leaf
                )));
            }
            if self.position(block.id)?.is_some() {
                return Err(OramError::ProtocolError(format!(
                    "block {} read from bucket {} is already in the stash",
                    block.id, node_index
                )));
            }
        }
        self.blocks.extend(bucket.into_blocks());
        Ok(())
    }

    /// Returns the value stored for `id`, if the stash holds it.
    pub fn find(&self, id: BlockId) -> Result<Option<&BlockValue>, OramError> {
        Ok(self.position(id)?.map(|i| &self.blocks[i].value))
    }

    /// Replaces the entry for `id`, if any, with a block assigned to `leaf` holding `value`.
    pub fn upsert(&mut self, id: BlockId, leaf: LeafIndex, value: BlockValue) -> Result<(), OramError> {
        if let Some(i) = self.position(id)? {
            self.blocks.remove(i);
        }
        self.blocks.push(PathOramBlock { id, leaf, value });
        Ok(())
    }

    /// Moves the entry for `id` to `leaf`. Returns whether the stash held `id`.
    pub fn reassign(&mut self, id: BlockId, leaf: LeafIndex) -> Result<bool, OramError> {
        match self.position(id)? {
            Some(i) => {
                self.blocks[i].leaf = leaf;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes and returns up to `capacity_remaining` blocks that may reside at `node`,
    /// which sits at `level`: those whose path passes through `node`.
    /// When more blocks are eligible, the ones that entered the stash earliest are chosen.
    pub fn take_for_bucket(
        &mut self,
        geometry: &TreeGeometry,
        node: NodeIndex,
        level: TreeHeight,
        capacity_remaining: BucketSize,
    ) -> Result<Vec<PathOramBlock>, OramError> {
        let mut eligible = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            eligible.push(geometry.node_on_path(block.leaf, level)? == node);
        }

        let mut taken = Vec::new();
        let mut kept = Vec::with_capacity(self.blocks.len());
        for (block, is_eligible) in self.blocks.drain(..).zip(eligible) {
            if is_eligible && taken.len() < capacity_remaining {
                taken.push(block);
            } else {
                kept.push(block);
            }
        }

        self.blocks = kept;
        Ok(taken)
    }

    /// The number of blocks in the stash.
    pub fn occupancy(&self) -> StashSize {
        self.blocks.len()
    }

    /// Whether the stash is empty.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterates over the stashed blocks in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &PathOramBlock> {
        self.blocks.iter()
    }

    fn position(&self, id: BlockId) -> Result<Option<usize>, OramError> {
        let mut found: Choice = 0.into();
        let mut index: u64 = 0;

        for (i, block) in self.blocks.iter().enumerate() {
            let is_requested_id = block.id.ct_eq(&id);
            index.conditional_assign(&u64::try_from(i)?, is_requested_id);
            found |= is_requested_id;
        }

        if bool::from(found) {
            Ok(Some(usize::try_from(index)?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: BlockId, leaf: LeafIndex) -> PathOramBlock {
        PathOramBlock {
            id,
            leaf,
            value: BlockValue::from(format!("block {id}").as_str()),
        }
    }

    #[test]
    fn drain_moves_every_occupied_slot() {
        let geometry = TreeGeometry::new(2).unwrap();
        let mut stash = Stash::new();
        let mut bucket = Bucket::with_blocks(0, vec![block(1, 0), block(2, 3)], 4).unwrap();
        bucket.slots.swap(0, 3);
        stash.drain_bucket_into_stash(bucket, &geometry, 4).unwrap();
        assert_eq!(stash.occupancy(), 2);
        assert_eq!(stash.find(1).unwrap(), Some(&BlockValue::from("block 1")));
        assert_eq!(stash.find(2).unwrap(), Some(&BlockValue::from("block 2")));
        assert_eq!(stash.find(3).unwrap(), None);
    }

    #[test]
    fn drain_rejects_overfull_bucket() {
        let geometry = TreeGeometry::new(2).unwrap();
        let mut stash = Stash::new();
        let bucket = Bucket::with_blocks(5, vec![block(1, 0), block(2, 0), block(3, 0)], 3).unwrap();
        let result = stash.drain_bucket_into_stash(bucket, &geometry, 2);
        assert!(matches!(
            result,
            Err(OramError::CapacityViolation {
                node_index: 5,
                occupied: 3,
                capacity: 2
            })
        ));
        assert!(stash.is_empty());
    }

    #[test]
    fn drain_rejects_duplicate_block() {
        let geometry = TreeGeometry::new(2).unwrap();
        let mut stash = Stash::new();
        stash.upsert(1, 0, BlockValue::from("a")).unwrap();
        let bucket = Bucket::with_blocks(0, vec![block(1, 2)], 4).unwrap();
        assert!(matches!(
            stash.drain_bucket_into_stash(bucket, &geometry, 4),
            Err(OramError::ProtocolError(_))
        ));
    }

    #[test]
    fn drain_rejects_leaf_outside_the_tree() {
        let geometry = TreeGeometry::new(3).unwrap();
        let mut stash = Stash::new();
        let bucket = Bucket::with_blocks(0, vec![block(1, 2), block(500, 1_000)], 4).unwrap();
        match stash.drain_bucket_into_stash(bucket, &geometry, 4) {
            Err(OramError::ProtocolError(message)) => assert!(message.contains("leaf 1000")),
            other => panic!("unexpected result {:?}", other),
        }
        // The well-formed block is not moved either.
        assert!(stash.is_empty());
    }

    #[test]
    fn upsert_replaces_existing_entry() {
        let mut stash = Stash::new();
        stash.upsert(1, 0, BlockValue::from("a")).unwrap();
        stash.upsert(2, 1, BlockValue::from("x")).unwrap();
        stash.upsert(1, 3, BlockValue::from("b")).unwrap();
        assert_eq!(stash.occupancy(), 2);
        assert_eq!(stash.find(1).unwrap(), Some(&BlockValue::from("b")));
        let leaves: Vec<(BlockId, LeafIndex)> = stash.iter().map(|b| (b.id, b.leaf)).collect();
        assert_eq!(leaves, vec![(2, 1), (1, 3)]);
    }

    #[test]
    fn reassign_moves_only_the_requested_block() {
        let mut stash = Stash::new();
        stash.upsert(1, 0, BlockValue::from("a")).unwrap();
        stash.upsert(2, 0, BlockValue::from("b")).unwrap();
        assert!(stash.reassign(2, 7).unwrap());
        assert!(!stash.reassign(3, 7).unwrap());
        let leaves: Vec<LeafIndex> = stash.iter().map(|b| b.leaf).collect();
        assert_eq!(leaves, vec![0, 7]);
    }

    #[test]
    fn take_for_bucket_selects_eligible_blocks_in_arrival_order() {
        // Height 3: leaves 0..=3 pass through node 1 at level 1, leaves 4..=7 through node 2.
        let geometry = TreeGeometry::new(3).unwrap();
        let mut stash = Stash::new();
        for (id, leaf) in [(1, 0), (2, 5), (3, 3), (4, 1), (5, 2)] {
            stash.upsert(id, leaf, BlockValue::default()).unwrap();
        }

        let taken = stash.take_for_bucket(&geometry, 1, 1, 2).unwrap();
        let ids: Vec<BlockId> = taken.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![1, 3]);

        let remaining: Vec<BlockId> = stash.iter().map(|b| b.id).collect();
        assert_eq!(remaining, vec![2, 4, 5]);

        let taken = stash.take_for_bucket(&geometry, 2, 1, 4).unwrap();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].id, 2);
        assert_eq!(stash.occupancy(), 2);
    }

    #[test]
    fn take_for_bucket_with_no_room_takes_nothing() {
        let geometry = TreeGeometry::new(2).unwrap();
        let mut stash = Stash::new();
        stash.upsert(1, 0, BlockValue::default()).unwrap();
        assert!(stash.take_for_bucket(&geometry, 0, 0, 0).unwrap().is_empty());
        assert_eq!(stash.occupancy(), 1);
    }

    #[test]
    fn failed_take_for_bucket_keeps_every_block() {
        let geometry = TreeGeometry::new(3).unwrap();
        let mut stash = Stash::new();
        for id in 0..6 {
            stash.upsert(id, id, BlockValue::default()).unwrap();
        }
        stash.upsert(6, 1_000, BlockValue::default()).unwrap();

        assert!(matches!(
            stash.take_for_bucket(&geometry, 0, 0, 10),
            Err(OramError::InvalidLeaf { leaf: 1_000, .. })
        ));
        assert_eq!(stash.occupancy(), 7);
    }
}
