// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Serves an in-memory bucket store over TCP, one client connection at a time.
//!
//! Usage: `bucket_server [address] [height] [capacity]`, by default
//! `127.0.0.1:7878 10 4`. The `interactive` demo can connect to it.

use oram_client::config::DEFAULT_BLOCKS_PER_BUCKET;
use oram_client::protocol::serve;
use oram_client::SimpleBucketStore;
use simplelog::{Config, LevelFilter, SimpleLogger};
use std::net::TcpListener;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    SimpleLogger::init(LevelFilter::Info, Config::default())?;

    let mut args = std::env::args().skip(1);
    let address = args.next().unwrap_or_else(|| "127.0.0.1:7878".into());
    let height = args.next().map(|h| h.parse()).transpose()?.unwrap_or(10);
    let capacity = args
        .next()
        .map(|z| z.parse())
        .transpose()?
        .unwrap_or(DEFAULT_BLOCKS_PER_BUCKET);

    // The tree outlives each connection, so a reconnecting client finds its blocks again.
    let mut store = SimpleBucketStore::new(height, capacity)?;
    let listener = TcpListener::bind(&address)?;
    log::info!("Serving a tree of height {} on {}", height, address);

    for stream in listener.incoming() {
        let mut stream = stream?;
        log::info!("Accepted connection from {}", stream.peer_addr()?);
        if let Err(e) = serve(&mut store, &mut stream) {
            log::warn!("Connection ended with an error: {}", e);
        }
        log::info!("Tree now holds {} blocks", store.tree_occupancy());
    }

    Ok(())
}
