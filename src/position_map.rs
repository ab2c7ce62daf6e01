// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! The client-held Path ORAM position map.

use crate::{tree_index::TreeGeometry, BlockId, LeafIndex, OramError};
use std::collections::HashMap;

/// Maps each block id to the leaf whose path the block currently resides on.
/// An id that is absent has never been accessed.
#[derive(Debug, Default)]
pub struct PositionMap {
    positions: HashMap<BlockId, LeafIndex>,
}

impl PositionMap {
    /// Returns an empty position map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the leaf `id` is assigned to, if `id` has been accessed before.
    pub fn lookup(&self, id: BlockId) -> Option<LeafIndex> {
        self.positions.get(&id).copied()
    }

    /// Assigns `id` to `leaf`, replacing any previous assignment.
    pub fn assign(&mut self, id: BlockId, leaf: LeafIndex) {
        self.positions.insert(id, leaf);
    }

    /// Installs an initial placement, typically the one returned by the bucket store
    /// when it seeds the tree. Every leaf is checked against `geometry` before any is installed.
    pub fn seed<I>(&mut self, entries: I, geometry: &TreeGeometry) -> Result<(), OramError>
    where
        I: IntoIterator<Item = (BlockId, LeafIndex)>,
    {
        let entries: Vec<(BlockId, LeafIndex)> = entries.into_iter().collect();
        for (_, leaf) in &entries {
            geometry.check_leaf(*leaf)?;
        }
        log::debug!("Seeding position map with {} entries", entries.len());
        self.positions.extend(entries);
        Ok(())
    }

    /// The number of ids that have an assigned leaf.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether no id has been assigned a leaf.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
