// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! A simple interactive demonstration of the Path ORAM client.
//!
//! With an address argument, the client talks to a bucket store served at that address
//! (see the `bucket_server` demo). Otherwise it uses a store held in memory.

use oram_client::config::DEFAULT_BLOCKS_PER_BUCKET;
use oram_client::{
    BlockValue, BucketStore, Oram, PathOramClient, RemoteBucketStore, SimpleBucketStore,
};
use rand::rngs::OsRng;
use rustyline::history::FileHistory;
use rustyline::Editor;

fn parse_number(
    prompt: &str,
    rl: &mut Editor<(), FileHistory>,
) -> Result<u64, Box<dyn std::error::Error>> {
    Ok(loop {
        println!("{}", prompt);
        println!();
        let readline: String = rl.readline("> ")?;
        let number_parse = readline.trim().parse::<u64>();
        match number_parse {
            Ok(number) => break number,
            Err(_) => {
                println!("Expected a number. Try again.");
                continue;
            }
        }
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut rl = Editor::<(), _>::new()?;

    let store: Box<dyn BucketStore> = match std::env::args().nth(1) {
        Some(address) => Box::new(RemoteBucketStore::connect(address)?),
        None => {
            let height = parse_number("How tall should the tree be?", &mut rl)?;
            Box::new(SimpleBucketStore::new(height, DEFAULT_BLOCKS_PER_BUCKET)?)
        }
    };

    let mut oram = PathOramClient::new(store, OsRng)?;
    println!(
        "Tree of height {} with {} blocks per bucket.",
        oram.geometry().height(),
        oram.bucket_capacity()
    );

    loop {
        let action = loop {
            println!("Enter an option (R or W):");
            println!("R) Read");
            println!("W) Write");
            let action: String = rl.readline("> ")?;
            let action = action.trim().to_uppercase();
            if (action != "R") & (action != "W") {
                println!("Try again.");
                continue;
            }
            break action;
        };

        let id = parse_number("Which block id?", &mut rl)?;

        if action == "R" {
            match oram.read(id)? {
                Some(value) => println!(
                    "Block {} holds \"{}\".",
                    id,
                    String::from_utf8_lossy(&value.into_bytes())
                ),
                None => println!("Block {} has never been written.", id),
            }
        }

        if action == "W" {
            println!("Value to write?");
            println!();
            let value: String = rl.readline("> ")?;
            oram.write(id, BlockValue::new(value.clone().into_bytes()))?;
            println!("Wrote \"{}\" to block {}.", value, id);
        }

        println!("The stash holds {} blocks.", oram.stash_occupancy());
    }
}
