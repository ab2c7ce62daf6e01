// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Bucket store abstractions for Path ORAM.

use crate::{
    bucket::{Bucket, PathOramBlock},
    tree_index::TreeGeometry,
    BlockId, BlockValue, BucketSize, LeafIndex, NodeIndex, OramError, TreeHeight,
};
use duplicate::duplicate_item;
use rand::{CryptoRng, RngCore};
use std::mem::size_of;

/// The largest tree, in bytes of bucket and slot storage, that `SimpleBucketStore` will allocate.
pub const MAXIMUM_IN_MEMORY_TREE_BYTES: usize = isize::MAX as usize;

/// The untrusted store holding the tree of buckets, as seen by the client.
pub trait BucketStore {
    /// Returns the height of the tree, fixed for the store's lifetime.
    fn tree_height(&mut self) -> Result<TreeHeight, OramError>;
    /// Returns the number of slots per bucket, fixed for the store's lifetime.
    fn bucket_capacity(&mut self) -> Result<BucketSize, OramError>;
    /// Reads the bucket at `node`.
    fn read_bucket(&mut self, node: NodeIndex) -> Result<Bucket, OramError>;
    /// Replaces the full slot set of the bucket at `bucket.node_index`.
    fn write_bucket(&mut self, bucket: Bucket) -> Result<(), OramError>;
    /// Empties the slot holding block `id` in the bucket at `node`, if there is one.
    fn remove_block(&mut self, node: NodeIndex, id: BlockId) -> Result<(), OramError>;
    /// Returns the placement of any blocks the store was seeded with.
    fn initial_position_map(&mut self) -> Result<Vec<(BlockId, LeafIndex)>, OramError>;
}

#[duplicate_item(
    store_pointer;
    [&mut S];
    [Box<S>];
)]
impl<S: BucketStore + ?Sized> BucketStore for store_pointer {
    fn tree_height(&mut self) -> Result<TreeHeight, OramError> {
        (**self).tree_height()
    }

    fn bucket_capacity(&mut self) -> Result<BucketSize, OramError> {
        (**self).bucket_capacity()
    }

    fn read_bucket(&mut self, node: NodeIndex) -> Result<Bucket, OramError> {
        (**self).read_bucket(node)
    }

    fn write_bucket(&mut self, bucket: Bucket) -> Result<(), OramError> {
        (**self).write_bucket(bucket)
    }

    fn remove_block(&mut self, node: NodeIndex, id: BlockId) -> Result<(), OramError> {
        (**self).remove_block(node, id)
    }

    fn initial_position_map(&mut self) -> Result<Vec<(BlockId, LeafIndex)>, OramError> {
        (**self).initial_position_map()
    }
}

/// A simple in-memory bucket store holding the tree as a Vec.
#[derive(Debug)]
pub struct SimpleBucketStore {
    geometry: TreeGeometry,
    capacity: BucketSize,
    buckets: Vec<Bucket>,
    seeded_positions: Vec<(BlockId, LeafIndex)>,
}

impl SimpleBucketStore {
    /// Returns a store holding an empty tree of the given height and bucket capacity.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidConfigurationError` if `capacity` is 0 or the tree is too tall.
    pub fn new(height: TreeHeight, capacity: BucketSize) -> Result<Self, OramError> {
        log::info!(
            "SimpleBucketStore::new(height = {}, capacity = {})",
            height,
            capacity
        );

        if capacity == 0 {
            return Err(OramError::InvalidConfigurationError(
                "bucket capacity must be at least 1".into(),
            ));
        }

        let geometry = TreeGeometry::new(height)?;
        let number_of_nodes = usize::try_from(geometry.node_count())?;
        let bucket_bytes = capacity
            .checked_mul(size_of::<Option<PathOramBlock>>())
            .and_then(|slot_bytes| slot_bytes.checked_add(size_of::<Bucket>()));
        let tree_bytes = bucket_bytes.and_then(|bytes| bytes.checked_mul(number_of_nodes));
        if tree_bytes.map_or(true, |bytes| bytes > MAXIMUM_IN_MEMORY_TREE_BYTES) {
            return Err(OramError::InvalidConfigurationError(format!(
                "a tree of height {} with {} slots per bucket does not fit in memory",
                height, capacity
            )));
        }

        let mut buckets = Vec::new();
        buckets.try_reserve_exact(number_of_nodes).map_err(|e| {
            OramError::InvalidConfigurationError(format!("cannot allocate the tree: {}", e))
        })?;
        buckets.extend((0..geometry.node_count()).map(|node| Bucket::empty(node, capacity)));

        Ok(Self {
            geometry,
            capacity,
            buckets,
            seeded_positions: Vec::new(),
        })
    }

    /// Returns a store whose tree already holds `blocks`, each placed on the path to a
    /// uniformly random leaf, as deep as there is room. The placement is reported
    /// through [`BucketStore::initial_position_map`].
    ///
    /// # Errors
    ///
    /// Returns an `InvalidConfigurationError` if some block finds no free slot on its path.
    pub fn new_seeded<I, R>(
        height: TreeHeight,
        capacity: BucketSize,
        blocks: I,
        rng: &mut R,
    ) -> Result<Self, OramError>
    where
        I: IntoIterator<Item = (BlockId, BlockValue)>,
        R: RngCore + CryptoRng,
    {
        let mut store = Self::new(height, capacity)?;

        for (id, value) in blocks {
            let leaf = store.geometry.random_leaf(rng);
            let mut placed = false;

            for level in (0..=store.geometry.height()).rev() {
                let node = store.geometry.node_on_path(leaf, level)?;
                let bucket = &mut store.buckets[usize::try_from(node)?];
                if let Some(slot) = bucket.slots.iter_mut().find(|slot| slot.is_none()) {
                    *slot = Some(PathOramBlock { id, leaf, value });
                    placed = true;
                    break;
                }
            }

            if !placed {
                return Err(OramError::InvalidConfigurationError(format!(
                    "no free slot on the path to leaf {} for block {}",
                    leaf, id
                )));
            }
            store.seeded_positions.push((id, leaf));
        }

        Ok(store)
    }

    /// The geometry of the stored tree.
    pub fn geometry(&self) -> &TreeGeometry {
        &self.geometry
    }

    /// Iterates over every bucket of the tree in node order.
    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter()
    }

    /// The number of blocks stored across the whole tree.
    pub fn tree_occupancy(&self) -> usize {
        self.buckets.iter().map(Bucket::occupancy).sum()
    }

    fn bucket_index(&self, node: NodeIndex) -> Result<usize, OramError> {
        self.geometry.check_node(node)?;
        Ok(usize::try_from(node)?)
    }
}

impl BucketStore for SimpleBucketStore {
    fn tree_height(&mut self) -> Result<TreeHeight, OramError> {
        Ok(self.geometry.height())
    }

    fn bucket_capacity(&mut self) -> Result<BucketSize, OramError> {
        Ok(self.capacity)
    }

    fn read_bucket(&mut self, node: NodeIndex) -> Result<Bucket, OramError> {
        let index = self.bucket_index(node)?;
        Ok(self.buckets[index].clone())
    }

    fn write_bucket(&mut self, bucket: Bucket) -> Result<(), OramError> {
        let index = self.bucket_index(bucket.node_index)?;
        bucket.check_capacity(self.capacity)?;
        let node_index = bucket.node_index;
        let blocks = bucket.into_blocks().collect();
        self.buckets[index] = Bucket::with_blocks(node_index, blocks, self.capacity)?;
        Ok(())
    }

    fn remove_block(&mut self, node: NodeIndex, id: BlockId) -> Result<(), OramError> {
        let index = self.bucket_index(node)?;
        for slot in self.buckets[index].slots.iter_mut() {
            if slot.as_ref().is_some_and(|block| block.id == id) {
                *slot = None;
            }
        }
        Ok(())
    }

    fn initial_position_map(&mut self) -> Result<Vec<(BlockId, LeafIndex)>, OramError> {
        Ok(self.seeded_positions.clone())
    }
}

/// A physical access made to a bucket store, as an observer of the store would see it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhysicalAccess {
    /// A bucket read.
    Read(NodeIndex),
    /// A bucket write.
    Write(NodeIndex),
}

/// A bucket store that counts, and records, the reads and writes made to each bucket.
#[derive(Debug)]
pub struct CountAccessesBucketStore {
    data: SimpleBucketStore,
    /// `reads[i]` tracks the total number of reads made to node `i`.
    pub reads: Vec<u64>,
    /// `writes[i]` tracks the total number of writes made to node `i`.
    pub writes: Vec<u64>,
    /// Every physical access, in order.
    pub trace: Vec<PhysicalAccess>,
}

impl CountAccessesBucketStore {
    /// Wraps `data`, starting every count at zero.
    pub fn new(data: SimpleBucketStore) -> Result<Self, OramError> {
        let number_of_nodes = usize::try_from(data.geometry().node_count())?;
        Ok(Self {
            data,
            reads: vec![0u64; number_of_nodes],
            writes: vec![0u64; number_of_nodes],
            trace: Vec::new(),
        })
    }

    /// Returns the total number of reads to the store.
    pub fn get_read_count(&self) -> u64 {
        self.reads.iter().sum()
    }

    /// Returns the total number of writes to the store.
    pub fn get_write_count(&self) -> u64 {
        self.writes.iter().sum()
    }

    /// The wrapped store.
    pub fn inner(&self) -> &SimpleBucketStore {
        &self.data
    }
}

impl BucketStore for CountAccessesBucketStore {
    fn tree_height(&mut self) -> Result<TreeHeight, OramError> {
        self.data.tree_height()
    }

    fn bucket_capacity(&mut self) -> Result<BucketSize, OramError> {
        self.data.bucket_capacity()
    }

    fn read_bucket(&mut self, node: NodeIndex) -> Result<Bucket, OramError> {
        log::debug!("Physical read -- {}", node);

        let bucket = self.data.read_bucket(node)?;
        self.reads[usize::try_from(node)?] += 1;
        self.trace.push(PhysicalAccess::Read(node));
        Ok(bucket)
    }

    fn write_bucket(&mut self, bucket: Bucket) -> Result<(), OramError> {
        log::debug!("Physical write -- {}", bucket.node_index);

        let node = bucket.node_index;
        self.data.write_bucket(bucket)?;
        self.writes[usize::try_from(node)?] += 1;
        self.trace.push(PhysicalAccess::Write(node));
        Ok(())
    }

    fn remove_block(&mut self, node: NodeIndex, id: BlockId) -> Result<(), OramError> {
        self.data.remove_block(node, id)
    }

    fn initial_position_map(&mut self) -> Result<Vec<(BlockId, LeafIndex)>, OramError> {
        self.data.initial_position_map()
    }
}
