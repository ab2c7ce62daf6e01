// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Common test utilities for the `oram-client` crate.

use crate::database::{CountAccessesBucketStore, PhysicalAccess, SimpleBucketStore};
use crate::{
    BlockId, BlockValue, BucketSize, Operation, Oram, OramError, PathOramClient, TreeHeight,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use simplelog::{Config, WriteLogger};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Write};
use std::sync::Once;

static INIT: Once = Once::new();

const TEST_BLOCK_SIZE: usize = 16;

// For use in manual testing and inspection.
pub(crate) fn init_logger() {
    INIT.call_once(|| {
        WriteLogger::init(log::LevelFilter::Info, Config::default(), std::io::stdout()).unwrap()
    })
}

/// A byte stream that replays a fixed input and records everything written to it.
#[derive(Debug)]
pub(crate) struct ScriptedStream {
    input: Cursor<Vec<u8>>,
    pub(crate) written: Vec<u8>,
}

impl ScriptedStream {
    pub(crate) fn new(input: Vec<u8>) -> Self {
        Self {
            input: Cursor::new(input),
            written: Vec::new(),
        }
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub(crate) type SimpleClient = PathOramClient<SimpleBucketStore, StdRng>;
pub(crate) type CountingClient = PathOramClient<CountAccessesBucketStore, StdRng>;

pub(crate) trait Testable: Oram + Sized {
    fn new_for_test(height: TreeHeight, capacity: BucketSize, rng: StdRng)
        -> Result<Self, OramError>;

    fn test_hook(&self) {}
}

impl Testable for SimpleClient {
    fn new_for_test(
        height: TreeHeight,
        capacity: BucketSize,
        rng: StdRng,
    ) -> Result<Self, OramError> {
        PathOramClient::new(SimpleBucketStore::new(height, capacity)?, rng)
    }

    fn test_hook(&self) {
        for bucket in self.store().buckets() {
            assert!(bucket.occupancy() <= self.bucket_capacity());
        }
    }
}

fn new_counting_client(
    height: TreeHeight,
    capacity: BucketSize,
    rng: StdRng,
) -> Result<CountingClient, OramError> {
    let store = CountAccessesBucketStore::new(SimpleBucketStore::new(height, capacity)?)?;
    PathOramClient::new(store, rng)
}

/// Tests the correctness of an `Oram` type T on a workload of random reads and writes
/// over the ids `0..num_ids`.
pub(crate) fn test_correctness_random_workload<T: Testable>(
    height: TreeHeight,
    capacity: BucketSize,
    num_ids: BlockId,
    num_operations: u32,
) {
    init_logger();
    let mut rng = StdRng::seed_from_u64(0);

    let mut oram = T::new_for_test(height, capacity, StdRng::seed_from_u64(1)).unwrap();
    let mut mirror: HashMap<BlockId, BlockValue> = HashMap::new();

    for _ in 0..num_operations {
        let random_id = rng.gen_range(0..num_ids);
        let read_versus_write = rng.gen::<bool>();

        if read_versus_write {
            assert_eq!(oram.read(random_id).unwrap().as_ref(), mirror.get(&random_id));
        } else {
            let random_block_value = BlockValue::random(TEST_BLOCK_SIZE, &mut rng);
            oram.write(random_id, random_block_value.clone()).unwrap();
            mirror.insert(random_id, random_block_value);
        }
    }

    for id in 0..num_ids {
        assert_eq!(oram.read(id).unwrap().as_ref(), mirror.get(&id), "{id}");
    }

    oram.test_hook();
}

/// Tests the correctness of an `Oram` type T on repeated passes of sequential accesses to `0..num_ids`.
pub(crate) fn test_correctness_linear_workload<T: Testable>(
    height: TreeHeight,
    capacity: BucketSize,
    num_ids: BlockId,
    num_operations: u32,
) {
    init_logger();
    let mut rng = StdRng::seed_from_u64(0);

    let mut oram = T::new_for_test(height, capacity, StdRng::seed_from_u64(1)).unwrap();
    let mut mirror: HashMap<BlockId, BlockValue> = HashMap::new();

    let num_passes = u64::from(num_operations) / num_ids;

    for _ in 0..num_passes {
        for id in 0..num_ids {
            let read_versus_write = rng.gen::<bool>();

            if read_versus_write {
                assert_eq!(oram.read(id).unwrap().as_ref(), mirror.get(&id));
            } else {
                let random_block_value = BlockValue::random(TEST_BLOCK_SIZE, &mut rng);
                oram.write(id, random_block_value.clone()).unwrap();
                mirror.insert(id, random_block_value);
            }
        }
    }

    for id in 0..num_ids {
        assert_eq!(oram.read(id).unwrap().as_ref(), mirror.get(&id), "{id}");
    }

    oram.test_hook();
}

macro_rules! create_correctness_test {
    ($function_name:ident, $oram_type:ident, $height:literal, $capacity:literal, $num_ids:literal, $iterations_to_test:literal) => {
        paste::paste! {
            #[test]
            fn [<$function_name _ $oram_type:snake _ $height _ $capacity _ $num_ids _ $iterations_to_test>]() {
                $function_name::<$oram_type>($height, $capacity, $num_ids, $iterations_to_test);
            }
        }
    };
}

// Every parameter set leaves the tree comfortably larger than the number of ids,
// so that the stash size monitor's bound holds.
macro_rules! create_correctness_tests_for_workload_and_oram_type {
    ($function_name:ident, $oram_type:ident) => {
        create_correctness_test!($function_name, $oram_type, 1, 4, 4, 100);
        create_correctness_test!($function_name, $oram_type, 2, 4, 8, 200);
        create_correctness_test!($function_name, $oram_type, 3, 4, 16, 1000);
        create_correctness_test!($function_name, $oram_type, 3, 5, 8, 500);
        create_correctness_test!($function_name, $oram_type, 4, 3, 16, 1000);
        create_correctness_test!($function_name, $oram_type, 5, 4, 32, 1000);
    };
}

macro_rules! create_correctness_tests_for_oram_type {
    ($oram_type:ident) => {
        create_correctness_tests_for_workload_and_oram_type!(
            test_correctness_linear_workload,
            $oram_type
        );
        create_correctness_tests_for_workload_and_oram_type!(
            test_correctness_random_workload,
            $oram_type
        );
    };
}

pub(crate) use create_correctness_test;
pub(crate) use create_correctness_tests_for_oram_type;
pub(crate) use create_correctness_tests_for_workload_and_oram_type;

macro_rules! monitor_boilerplate {
    ($($field:ident: $init:expr),*) => {
        fn new_for_test(
            height: TreeHeight,
            capacity: BucketSize,
            rng: StdRng,
        ) -> Result<Self, OramError> {
            Ok(Self {
                oram: new_counting_client(height, capacity, rng)?,
                $($field: $init),*
            })
        }
    };
}

/// Checks after every access that the stash holds no more than one path's worth of blocks.
#[derive(Debug)]
pub(crate) struct StashSizeMonitor {
    oram: CountingClient,
}

impl Testable for StashSizeMonitor {
    monitor_boilerplate!();
}

impl Oram for StashSizeMonitor {
    fn access(&mut self, op: Operation, id: BlockId) -> Result<Option<BlockValue>, OramError> {
        let result = self.oram.access(op, id);
        let path_size =
            self.oram.bucket_capacity() * (usize::try_from(self.oram.geometry().height())? + 1);
        assert!(self.oram.stash_occupancy() <= path_size);
        result
    }
}

/// Checks after every access that every block written is in exactly one of the stash
/// and the tree, and that no bucket is over capacity.
#[derive(Debug)]
pub(crate) struct ConstantOccupancyMonitor {
    oram: CountingClient,
    written: HashSet<BlockId>,
}

impl Testable for ConstantOccupancyMonitor {
    monitor_boilerplate!(written: HashSet::new());
}

impl Oram for ConstantOccupancyMonitor {
    fn access(&mut self, op: Operation, id: BlockId) -> Result<Option<BlockValue>, OramError> {
        let is_write = matches!(op, Operation::Write(_));
        let result = self.oram.access(op, id)?;
        if is_write {
            self.written.insert(id);
        }

        let stash_occupancy = self.oram.stash_occupancy();
        let tree_occupancy = self.oram.store().inner().tree_occupancy();
        assert_eq!(stash_occupancy + tree_occupancy, self.written.len());

        let mut seen = HashSet::new();
        for block in self.oram.stash().iter() {
            assert!(seen.insert(block.id), "block {} is duplicated", block.id);
        }
        for bucket in self.oram.store().inner().buckets() {
            assert!(bucket.occupancy() <= self.oram.bucket_capacity());
            for block in bucket.blocks() {
                assert!(seen.insert(block.id), "block {} is duplicated", block.id);
            }
        }

        Ok(result)
    }
}

/// Checks that every access reads exactly one root-to-leaf path, then writes the same path
/// back from the leaf up.
#[derive(Debug)]
pub(crate) struct PhysicalAccessCountMonitor {
    oram: CountingClient,
}

impl Testable for PhysicalAccessCountMonitor {
    monitor_boilerplate!();
}

impl Oram for PhysicalAccessCountMonitor {
    fn access(&mut self, op: Operation, id: BlockId) -> Result<Option<BlockValue>, OramError> {
        let pre_read_count = self.oram.store().get_read_count();
        let pre_write_count = self.oram.store().get_write_count();
        let pre_trace_length = self.oram.store().trace.len();

        let result = self.oram.access(op, id);

        let path_length = self.oram.geometry().height() + 1;
        let reads = self.oram.store().get_read_count() - pre_read_count;
        let writes = self.oram.store().get_write_count() - pre_write_count;
        assert_eq!(reads, path_length);
        assert_eq!(writes, path_length);

        let trace = &self.oram.store().trace[pre_trace_length..];
        let (read_half, write_half) = trace.split_at(usize::try_from(path_length)?);

        let mut read_nodes = Vec::new();
        for access in read_half {
            match access {
                PhysicalAccess::Read(node) => read_nodes.push(*node),
                PhysicalAccess::Write(node) => panic!("write to {node} during the read phase"),
            }
        }
        assert_eq!(read_nodes[0], 0);
        for pair in read_nodes.windows(2) {
            assert_eq!(self.oram.geometry().parent(pair[1])?, Some(pair[0]));
        }

        let mut written_nodes = Vec::new();
        for access in write_half {
            match access {
                PhysicalAccess::Write(node) => written_nodes.push(*node),
                PhysicalAccess::Read(node) => panic!("read of {node} during the write phase"),
            }
        }
        written_nodes.reverse();
        assert_eq!(read_nodes, written_nodes);

        result
    }
}
