// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Geometry of the complete binary tree of buckets.
//!
//! Nodes use 0-based numbering: the root is node 0 and the children of node `i`
//! are `2i + 1` and `2i + 2`. Leaves are addressed by their ordinal `0..2^height`,
//! so leaf `l` lives at node `2^height - 1 + l`.

use crate::{LeafIndex, NodeIndex, OramError, TreeHeight};
use rand::{CryptoRng, Rng, RngCore};

/// The largest tree height whose node indices fit in a `NodeIndex`.
pub const MAXIMUM_TREE_HEIGHT: TreeHeight = 63;

const INDEX_BITLENGTH: TreeHeight = 64;

/// The shape of a tree of fixed height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeGeometry {
    height: TreeHeight,
}

impl TreeGeometry {
    /// Returns the geometry of a tree with `height` levels below the root.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidConfigurationError` if `height` exceeds [`MAXIMUM_TREE_HEIGHT`].
    pub fn new(height: TreeHeight) -> Result<Self, OramError> {
        if height > MAXIMUM_TREE_HEIGHT {
            return Err(OramError::InvalidConfigurationError(format!(
                "tree height {} exceeds the maximum of {}",
                height, MAXIMUM_TREE_HEIGHT
            )));
        }
        Ok(Self { height })
    }

    /// The level of the leaves.
    pub fn height(&self) -> TreeHeight {
        self.height
    }

    /// The number of leaves, `2^height`.
    pub fn leaf_count(&self) -> u64 {
        1u64 << self.height
    }

    /// The number of nodes, `2^(height + 1) - 1`.
    pub fn node_count(&self) -> u64 {
        // Written this way so that the maximum height does not overflow.
        (self.leaf_count() - 1) + self.leaf_count()
    }

    /// Draws a uniformly random leaf.
    pub fn random_leaf<R: RngCore + CryptoRng>(&self, rng: &mut R) -> LeafIndex {
        rng.gen_range(0..self.leaf_count())
    }

    /// Returns the node at `level` on the path from the root to `leaf`.
    pub fn node_on_path(&self, leaf: LeafIndex, level: TreeHeight) -> Result<NodeIndex, OramError> {
        self.check_leaf(leaf)?;
        self.check_level(level)?;

        // In 1-based heap numbering the path is a sequence of prefixes of the leaf's index.
        let one_based_leaf = self.leaf_count() + leaf;
        let shift = self.height - level;
        Ok((one_based_leaf >> shift) - 1)
    }

    /// Returns the node holding `leaf`.
    pub fn leaf_node(&self, leaf: LeafIndex) -> Result<NodeIndex, OramError> {
        self.node_on_path(leaf, self.height)
    }

    /// Returns the nodes on the path to `leaf`, ordered from the root down.
    pub fn path(&self, leaf: LeafIndex) -> Result<Vec<NodeIndex>, OramError> {
        (0..=self.height)
            .map(|level| self.node_on_path(leaf, level))
            .collect()
    }

    /// Returns the level of `node`.
    pub fn level_of(&self, node: NodeIndex) -> Result<TreeHeight, OramError> {
        self.check_node(node)?;
        let one_based: u64 = node + 1;
        let leading_zeroes: u64 = one_based.leading_zeros().into();
        Ok(INDEX_BITLENGTH - leading_zeroes - 1)
    }

    /// Returns the parent of `node`, or `None` for the root.
    pub fn parent(&self, node: NodeIndex) -> Result<Option<NodeIndex>, OramError> {
        self.check_node(node)?;
        if node == 0 {
            return Ok(None);
        }
        Ok(Some((node - 1) / 2))
    }

    /// Returns the deepest level at which the paths to `a` and `b` share a node.
    pub fn deepest_common_level(&self, a: LeafIndex, b: LeafIndex) -> Result<TreeHeight, OramError> {
        self.check_leaf(a)?;
        self.check_leaf(b)?;
        let differing_bits: u64 = INDEX_BITLENGTH - u64::from((a ^ b).leading_zeros());
        Ok(self.height - differing_bits)
    }

    pub(crate) fn check_leaf(&self, leaf: LeafIndex) -> Result<(), OramError> {
        if leaf >= self.leaf_count() {
            return Err(OramError::InvalidLeaf {
                leaf,
                leaf_count: self.leaf_count(),
            });
        }
        Ok(())
    }

    pub(crate) fn check_level(&self, level: TreeHeight) -> Result<(), OramError> {
        if level > self.height {
            return Err(OramError::InvalidLevel {
                level,
                height: self.height,
            });
        }
        Ok(())
    }

    pub(crate) fn check_node(&self, node: NodeIndex) -> Result<(), OramError> {
        if node >= self.node_count() {
            return Err(OramError::InvalidNode {
                node_index: node,
                node_count: self.node_count(),
            });
        }
        Ok(())
    }
}
