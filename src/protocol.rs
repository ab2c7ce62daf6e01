// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! The request/response protocol spoken with a remote bucket store.
//!
//! Every message travels as one frame: a 4-byte big-endian length followed by that many
//! bytes of JSON encoding a [`Request`] or a [`Response`]. A frame that is truncated,
//! oversized, or does not decode into the expected shape is a `ProtocolError`.

use crate::{
    bucket::Bucket, database::BucketStore, BlockId, BucketSize, LeafIndex, NodeIndex, OramError,
    TreeHeight,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::io::{ErrorKind, Read, Write};

/// The largest frame body either side will send or accept.
pub const MAX_FRAME_SIZE: usize = 16 << 20;

const FRAME_HEADER_SIZE: usize = 4;

/// A request to the bucket store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Request {
    /// Asks for the height of the tree.
    GetTreeHeight,
    /// Asks for the number of slots per bucket.
    GetBucketCapacity,
    /// Asks for the bucket at `node_index`.
    GetBucket {
        /// The node to read.
        node_index: NodeIndex,
    },
    /// Replaces the full slot set of the bucket at `bucket.node_index`.
    WriteBucket {
        /// The new contents.
        bucket: Bucket,
    },
    /// Empties the slot holding `block_id` in the bucket at `node_index`.
    RemoveBucket {
        /// The node to modify.
        node_index: NodeIndex,
        /// The block to drop.
        block_id: BlockId,
    },
    /// Asks for the placement of any blocks the store was seeded with.
    InitializePositionMap,
}

/// A response from the bucket store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    /// Answers `GetTreeHeight`.
    TreeHeight {
        /// The height of the tree.
        height: TreeHeight,
    },
    /// Answers `GetBucketCapacity`.
    BucketCapacity {
        /// The number of slots per bucket.
        capacity: BucketSize,
    },
    /// Answers `GetBucket`.
    Bucket {
        /// The bucket read.
        bucket: Bucket,
    },
    /// Acknowledges `WriteBucket` and `RemoveBucket`.
    Ack,
    /// Answers `InitializePositionMap`.
    PositionMap {
        /// `(block id, leaf)` pairs.
        entries: Vec<(BlockId, LeafIndex)>,
    },
    /// The store failed to carry out the request.
    Error {
        /// A description of the failure.
        message: String,
    },
}

impl Response {
    /// A short name for the variant, for error messages.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Response::TreeHeight { .. } => "tree_height",
            Response::BucketCapacity { .. } => "bucket_capacity",
            Response::Bucket { .. } => "bucket",
            Response::Ack => "ack",
            Response::PositionMap { .. } => "position_map",
            Response::Error { .. } => "error",
        }
    }
}

/// Serializes `message` into a frame body.
pub fn encode<M: Serialize>(message: &M) -> Result<Vec<u8>, OramError> {
    serde_json::to_vec(message)
        .map_err(|e| OramError::ProtocolError(format!("cannot encode message: {}", e)))
}

/// Deserializes a frame body into a message.
pub fn decode<M: DeserializeOwned>(body: &[u8]) -> Result<M, OramError> {
    serde_json::from_slice(body)
        .map_err(|e| OramError::ProtocolError(format!("cannot decode message: {}", e)))
}

/// Writes `body` as one frame and flushes `writer`.
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, body: &[u8]) -> Result<(), OramError> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(OramError::ProtocolError(format!(
            "frame of {} bytes exceeds the maximum of {}",
            body.len(),
            MAX_FRAME_SIZE
        )));
    }
    let length = u32::try_from(body.len())?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + body.len());
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(body);
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame body from `reader`. Returns `None` if the peer closed the stream
/// cleanly before the start of a frame.
pub fn read_frame<R: Read + ?Sized>(reader: &mut R) -> Result<Option<Vec<u8>>, OramError> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let mut filled = 0;
    while filled < FRAME_HEADER_SIZE {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(OramError::ProtocolError(
                    "stream ended inside a frame header".into(),
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let length = usize::try_from(u32::from_be_bytes(header))?;
    if length > MAX_FRAME_SIZE {
        return Err(OramError::ProtocolError(format!(
            "frame of {} bytes exceeds the maximum of {}",
            length, MAX_FRAME_SIZE
        )));
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => OramError::ProtocolError(format!(
            "stream ended inside a frame body of {} bytes",
            length
        )),
        _ => OramError::ConnectionError(e),
    })?;
    Ok(Some(body))
}

/// Carries out `request` against `store`. Failures are reported as `Response::Error`.
pub fn respond<S: BucketStore + ?Sized>(store: &mut S, request: Request) -> Response {
    let result = match request {
        Request::GetTreeHeight => store
            .tree_height()
            .map(|height| Response::TreeHeight { height }),
        Request::GetBucketCapacity => store
            .bucket_capacity()
            .map(|capacity| Response::BucketCapacity { capacity }),
        Request::GetBucket { node_index } => store
            .read_bucket(node_index)
            .map(|bucket| Response::Bucket { bucket }),
        Request::WriteBucket { bucket } => store.write_bucket(bucket).map(|_| Response::Ack),
        Request::RemoveBucket {
            node_index,
            block_id,
        } => store
            .remove_block(node_index, block_id)
            .map(|_| Response::Ack),
        Request::InitializePositionMap => store
            .initial_position_map()
            .map(|entries| Response::PositionMap { entries }),
    };

    result.unwrap_or_else(|e| {
        log::warn!("Bucket store request failed: {}", e);
        Response::Error {
            message: e.to_string(),
        }
    })
}

/// Answers framed requests read from `stream` with `store` until the peer closes the stream.
/// A request that cannot be decoded is answered with `Response::Error`.
pub fn serve<S, T>(store: &mut S, stream: &mut T) -> Result<(), OramError>
where
    S: BucketStore + ?Sized,
    T: Read + Write + ?Sized,
{
    while let Some(body) = read_frame(stream)? {
        let response = match decode::<Request>(&body) {
            Ok(request) => {
                log::debug!("Serving {:?}", request);
                respond(store, request)
            }
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        };
        write_frame(stream, &encode(&response)?)?;
    }
    log::debug!("Peer closed the connection");
    Ok(())
}
