//! Shared data generators and constants for all benchmarks.
//!
//! This module provides:
//! - Random addresses, ranges and CIDR blocks
//! - Common benchmark constants (range lengths, thread counts)
//! - Helpers for pre-populating an index
#![allow(dead_code)]
use iplist::{AddressRange, ShardedBitmapIndex};
use rand::{thread_rng, Rng};

// DATA GENERATORS

/// Uniformly random IPv4 addresses.
pub fn generate_addrs(count: usize) -> Vec<u32> {
    let mut rng = thread_rng();
    (0..count).map(|_| rng.gen()).collect()
}

/// Random addresses confined to `shards` consecutive shards starting at `first`.
pub fn generate_addrs_in_shards(count: usize, first: u32, shards: u32) -> Vec<u32> {
    let mut rng = thread_rng();
    (0..count)
        .map(|_| {
            let shard = first + rng.gen_range(0..shards);
            (shard << 16) | rng.gen_range(0..65536u32)
        })
        .collect()
}

/// Random ranges of exactly `len` addresses.
pub fn generate_ranges(count: usize, len: u32) -> Vec<AddressRange> {
    let mut rng = thread_rng();
    (0..count)
        .map(|_| {
            let start = rng.gen_range(0..=u32::MAX - (len - 1));
            AddressRange::new(start, start + (len - 1)).unwrap()
        })
        .collect()
}

/// Random CIDR blocks with prefixes in `prefixes`.
pub fn generate_cidrs(count: usize, prefixes: std::ops::RangeInclusive<u32>) -> Vec<AddressRange> {
    let mut rng = thread_rng();
    (0..count)
        .map(|_| {
            let prefix = rng.gen_range(prefixes.clone());
            AddressRange::from_cidr(rng.gen::<u32>(), prefix).unwrap()
        })
        .collect()
}

/// Textual keys in all three accepted forms.
pub fn generate_keys(count: usize) -> Vec<String> {
    let mut rng = thread_rng();
    (0..count)
        .map(|i| {
            let addr = std::net::Ipv4Addr::from(rng.gen::<u32>());
            match i % 3 {
                0 => addr.to_string(),
                1 => format!("{}/{}", addr, rng.gen_range(8..=31)),
                _ => {
                    let start = u32::from(addr).min(u32::MAX - 5000);
                    let end = start + rng.gen_range(0..5000);
                    AddressRange::new(start, end).unwrap().to_string()
                }
            }
        })
        .collect()
}

// CONSTANTS

/// Range lengths exercising the per-bit, leading/trailing and interior paths.
pub const RANGE_LENGTHS: &[u32] = &[1, 48, 256, 4_096, 65_536, 1 << 20];

/// Thread counts for scaling benchmarks.
pub const THREAD_COUNTS: &[usize] = &[1, 2, 4, 8];

// HELPERS

/// An index holding `count` random `/24` blocks.
pub fn populated_index(count: usize) -> ShardedBitmapIndex {
    let index = ShardedBitmapIndex::new();
    for r in generate_cidrs(count, 24..=24) {
        index.insert(r).unwrap();
    }
    index
}
