// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! A `BucketStore` reached over a byte stream.

use crate::{
    bucket::Bucket,
    database::BucketStore,
    protocol::{decode, encode, read_frame, write_frame, Request, Response},
    BlockId, BucketSize, LeafIndex, NodeIndex, OramError, TreeHeight,
};
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

/// A bucket store on the far side of `stream`, spoken to with the framed protocol
/// of [`crate::protocol`]. Each call is one blocking request/response round trip.
#[derive(Debug)]
pub struct RemoteBucketStore<T> {
    stream: T,
}

impl RemoteBucketStore<TcpStream> {
    /// Opens a TCP connection to the store at `address`.
    pub fn connect<A: ToSocketAddrs>(address: A) -> Result<Self, OramError> {
        let stream = TcpStream::connect(address)?;
        stream.set_nodelay(true)?;
        log::info!("Connected to bucket store at {}", stream.peer_addr()?);
        Ok(Self::new(stream))
    }
}

impl<T: Read + Write> RemoteBucketStore<T> {
    /// Speaks to a store over an already open `stream`.
    pub fn new(stream: T) -> Self {
        Self { stream }
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> T {
        self.stream
    }

    fn call(&mut self, request: &Request) -> Result<Response, OramError> {
        write_frame(&mut self.stream, &encode(request)?)?;
        let body = read_frame(&mut self.stream)?.ok_or_else(|| {
            OramError::ConnectionError(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "bucket store closed the connection",
            ))
        })?;

        match decode::<Response>(&body)? {
            Response::Error { message } => Err(OramError::ProtocolError(format!(
                "bucket store reported an error: {}",
                message
            ))),
            response => Ok(response),
        }
    }
}

fn unexpected(request: &str, response: &Response) -> OramError {
    OramError::ProtocolError(format!(
        "unexpected {} response to {}",
        response.kind(),
        request
    ))
}

impl<T: Read + Write> BucketStore for RemoteBucketStore<T> {
    fn tree_height(&mut self) -> Result<TreeHeight, OramError> {
        match self.call(&Request::GetTreeHeight)? {
            Response::TreeHeight { height } => Ok(height),
            other => Err(unexpected("get_tree_height", &other)),
        }
    }

    fn bucket_capacity(&mut self) -> Result<BucketSize, OramError> {
        match self.call(&Request::GetBucketCapacity)? {
            Response::BucketCapacity { capacity } if capacity >= 1 => Ok(capacity),
            Response::BucketCapacity { capacity } => Err(OramError::ProtocolError(format!(
                "bucket capacity {} is below 1",
                capacity
            ))),
            other => Err(unexpected("get_bucket_capacity", &other)),
        }
    }

    fn read_bucket(&mut self, node: NodeIndex) -> Result<Bucket, OramError> {
        match self.call(&Request::GetBucket { node_index: node })? {
            Response::Bucket { bucket } if bucket.node_index == node => Ok(bucket),
            Response::Bucket { bucket } => Err(OramError::ProtocolError(format!(
                "asked for bucket {} but received bucket {}",
                node, bucket.node_index
            ))),
            other => Err(unexpected("get_bucket", &other)),
        }
    }

    fn write_bucket(&mut self, bucket: Bucket) -> Result<(), OramError> {
        match self.call(&Request::WriteBucket { bucket })? {
            Response::Ack => Ok(()),
            other => Err(unexpected("write_bucket", &other)),
        }
    }

    fn remove_block(&mut self, node: NodeIndex, id: BlockId) -> Result<(), OramError> {
        let request = Request::RemoveBucket {
            node_index: node,
            block_id: id,
        };
        match self.call(&request)? {
            Response::Ack => Ok(()),
            other => Err(unexpected("remove_bucket", &other)),
        }
    }

    fn initial_position_map(&mut self) -> Result<Vec<(BlockId, LeafIndex)>, OramError> {
        match self.call(&Request::InitializePositionMap)? {
            Response::PositionMap { entries } => Ok(entries),
            other => Err(unexpected("initialize_position_map", &other)),
        }
    }
}
