// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! A very simple demonstration of the use of the Path ORAM client.

extern crate oram_client;

use oram_client::config::DEFAULT_BLOCKS_PER_BUCKET;
use oram_client::{BlockValue, Oram, OramError, PathOramClient, SimpleBucketStore};
use rand::rngs::OsRng;

fn main() -> Result<(), OramError> {
    let store = SimpleBucketStore::new(6, DEFAULT_BLOCKS_PER_BUCKET)?;
    let mut oram = PathOramClient::new(store, OsRng)?;
    oram.write(0, BlockValue::from("hello"))?;
    if let Some(value) = oram.read(0)? {
        println!("{}", String::from_utf8_lossy(value.as_bytes()));
    }
    Ok(())
}
