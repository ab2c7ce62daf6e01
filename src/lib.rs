// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! The client side of Path ORAM.
//!
//! A [`PathOramClient`] stores fixed-size blocks on an untrusted [`BucketStore`]
//! while hiding which block was accessed, and whether the access was a read or a write,
//! from anyone observing the store. The client keeps a position map and a stash locally,
//! and on every access reads and rewrites one full root-to-leaf path of buckets.
//!
//! ```
//! use oram_client::{BlockValue, Oram, PathOramClient, SimpleBucketStore};
//! use rand::rngs::OsRng;
//!
//! # fn main() -> Result<(), oram_client::OramError> {
//! let store = SimpleBucketStore::new(3, 4)?;
//! let mut client = PathOramClient::new(store, OsRng)?;
//! client.write(1, BlockValue::from("a"))?;
//! assert_eq!(client.read(1)?, Some(BlockValue::from("a")));
//! assert_eq!(client.read(2)?, None);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::cargo, clippy::doc_markdown, missing_docs, rustdoc::all)]

use std::num::TryFromIntError;
use thiserror::Error;

pub mod block_value;
pub mod bucket;
pub mod config;
pub mod database;
pub mod path_oram;
pub mod position_map;
pub mod protocol;
pub mod remote;
pub mod stash;
pub mod tree_index;

#[cfg(test)]
mod test_utils;

pub use crate::block_value::BlockValue;
pub use crate::bucket::{Bucket, PathOramBlock};
pub use crate::config::ClientConfig;
pub use crate::database::{BucketStore, CountAccessesBucketStore, SimpleBucketStore};
pub use crate::path_oram::PathOramClient;
pub use crate::remote::RemoteBucketStore;
pub use crate::tree_index::TreeGeometry;

/// The caller-assigned identifier of a logical block.
pub type BlockId = u64;
/// The ordinal of a leaf, in `0..2^height`.
pub type LeafIndex = u64;
/// The index of a tree node in 0-based complete binary tree numbering (root is 0).
pub type NodeIndex = u64;
/// The height of the tree, and the levels within it (root is level 0).
pub type TreeHeight = u64;
/// Numeric type used to represent the number of slots in a bucket.
pub type BucketSize = usize;
/// Numeric type used to represent the number of blocks in the stash.
pub type StashSize = usize;

/// An ORAM operation. A write carries the value to be stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Read the current value of a block.
    Read,
    /// Replace the value of a block.
    Write(BlockValue),
}

/// Represents an oblivious RAM mapping block identifiers to [`BlockValue`]s.
pub trait Oram {
    /// Performs one logical access. Returns the value read for `Operation::Read`,
    /// or `None` for writes and for reads of blocks that were never written.
    fn access(&mut self, op: Operation, id: BlockId) -> Result<Option<BlockValue>, OramError>;

    /// Obliviously reads the value stored for `id`.
    fn read(&mut self, id: BlockId) -> Result<Option<BlockValue>, OramError> {
        self.access(Operation::Read, id)
    }

    /// Obliviously writes `value` as the value stored for `id`.
    fn write(&mut self, id: BlockId, value: BlockValue) -> Result<(), OramError> {
        self.access(Operation::Write(value), id).map(|_| ())
    }
}

/// A list of error types which are produced during ORAM protocol execution.
#[derive(Error, Debug)]
pub enum OramError {
    /// A response from the bucket store was malformed, truncated, undecodable,
    /// or did not match the request it answers.
    #[error("Protocol error: {0}")]
    ProtocolError(String),
    /// A bucket would hold, or reported holding, more blocks than its capacity.
    #[error("Bucket {node_index} holds {occupied} blocks but its capacity is {capacity}")]
    CapacityViolation {
        /// The bucket concerned.
        node_index: NodeIndex,
        /// The number of occupied slots seen or requested.
        occupied: usize,
        /// The capacity of the bucket.
        capacity: BucketSize,
    },
    /// A tree level outside `0..=height`.
    #[error("Level {level} is outside a tree of height {height}")]
    InvalidLevel {
        /// The offending level.
        level: TreeHeight,
        /// The height of the tree.
        height: TreeHeight,
    },
    /// A leaf outside `0..2^height`.
    #[error("Leaf {leaf} is outside a tree with {leaf_count} leaves")]
    InvalidLeaf {
        /// The offending leaf.
        leaf: LeafIndex,
        /// The number of leaves in the tree.
        leaf_count: u64,
    },
    /// A node index outside the tree.
    #[error("Node {node_index} is outside a tree with {node_count} nodes")]
    InvalidNode {
        /// The offending node index.
        node_index: NodeIndex,
        /// The number of nodes in the tree.
        node_count: u64,
    },
    /// The bucket store could not be reached.
    #[error("Connection error")]
    ConnectionError(#[from] std::io::Error),
    /// An earlier access failed part-way; the client state can no longer be trusted.
    #[error("An earlier access was left incomplete; the client must be rebuilt")]
    IncompleteAccess,
    /// Errors arising from invalid parameters or configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfigurationError(String),
    /// A payload larger than the configured maximum block size.
    #[error("Block of {len} bytes exceeds the maximum block size of {max} bytes")]
    BlockTooLarge {
        /// The size of the rejected payload.
        len: usize,
        /// The configured maximum.
        max: usize,
    },
    /// Errors arising from conversions between integer types.
    #[error("Arithmetic error encountered")]
    IntegerConversionError(#[from] TryFromIntError),
}
