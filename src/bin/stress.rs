// Copyright 2025-2026 stm-occ Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Full-volume concurrency workloads against the transactional array.
//!
//! Each scenario runs four worker threads to completion and then asserts
//! that the final array state matches what a serial execution would have
//! produced. Exits 0 on success; an assertion failure panics and exits
//! non-zero.

use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use stm_occ::{atomically, TArray};

const CAPACITY: usize = 100;
const THREADS: usize = 4;
const OPS_PER_TRANSACTION: usize = 10;

type IntArray = TArray<i32, CAPACITY>;

/// Concurrency stress scenarios for the transactional array.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Scenario: 0 isolated writes, 1 blind writes with a designated
    /// winner, 2 interfering read-modify-writes, 3 random read/write
    /// workload.
    scenario: u32,

    /// Total transaction count for the random workload.
    #[arg(long, default_value_t = 1_000_000)]
    transactions: usize,

    /// Seed mixed into every transaction's generator.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    match args.scenario {
        0 => isolated_writes(),
        1 => blind_writes(),
        2 => interfering_rws(),
        3 => random_rws_checked(args.transactions, args.seed),
        other => {
            eprintln!("unknown scenario {other}; pick 0..=3");
            std::process::exit(2);
        }
    }

    println!("scenario {} passed", args.scenario);
}

/// Run `worker(me)` for `me` in `0..THREADS` on scoped threads and join.
/// A panicking worker propagates and fails the run.
fn spawn_workers<F>(worker: F)
where
    F: Fn(usize) + Sync,
{
    thread::scope(|scope| {
        for me in 0..THREADS {
            let worker = &worker;
            scope.spawn(move || worker(me));
        }
    });
}

/// Every thread writes its own cell but reads everybody else's.
fn isolated_writes() {
    let array = IntArray::new();

    spawn_workers(|me| {
        atomically(|tx| {
            for index in 0..THREADS {
                array.read(tx, index);
            }
            array.write(tx, me, me as i32 + 1);
        });
    });

    for index in 0..THREADS {
        assert_eq!(array.read_atomic(index), index as i32 + 1);
    }
    for index in THREADS..CAPACITY {
        assert_eq!(array.read_atomic(index), 0);
    }
}

/// Everybody floods cells 1..N while cell 0 is still zero; the last thread
/// also writes cell 0, invalidating every competing flood, so it wins.
fn blind_writes() {
    let array = IntArray::new();
    let winner = (THREADS - 1) as i32;

    spawn_workers(|me| {
        atomically(|tx| {
            if array.read(tx, 0) == 0 || me == THREADS - 1 {
                for index in 1..CAPACITY {
                    array.write(tx, index, me as i32);
                }
            }
            if me == THREADS - 1 {
                array.write(tx, 0, me as i32);
            }
        });
    });

    for index in 0..CAPACITY {
        assert_eq!(array.read_atomic(index), winner);
    }
}

/// Thread `me` increments every cell with `index % THREADS >= me`, so cell
/// `i` ends up at `i % THREADS + 1`.
fn interfering_rws() {
    let array = IntArray::new();

    spawn_workers(|me| {
        atomically(|tx| {
            for index in 0..CAPACITY {
                if index % THREADS >= me {
                    let current = array.read(tx, index);
                    array.write(tx, index, current + 1);
                }
            }
        });
    });

    for index in 0..CAPACITY {
        assert_eq!(array.read_atomic(index), (index % THREADS) as i32 + 1);
    }
}

/// Seeded random mix of reads and read-then-increments; reseeded per
/// attempt so retried transactions replay the same operations. Committed
/// increments on distinct cells are mirrored into `shadow` when given.
fn random_rws(
    array: &IntArray,
    me: usize,
    transactions: usize,
    global_seed: u64,
    shadow: Option<&[AtomicU32; CAPACITY]>,
) {
    let mut written: Vec<usize> = Vec::with_capacity(OPS_PER_TRANSACTION);

    for trans in 0..transactions {
        let seed = global_seed + me as u64 + trans as u64;

        atomically(|tx| {
            let mut rng = StdRng::seed_from_u64(seed);
            written.clear();

            let mut op = 0;
            while op < OPS_PER_TRANSACTION {
                let slot = rng.gen_range(0..CAPACITY);
                if rng.gen_bool(0.5) {
                    let current = array.read(tx, slot);
                    array.write(tx, slot, current + 1);
                    written.push(slot);
                    op += 2;
                } else {
                    array.read(tx, slot);
                    op += 1;
                }
            }
        });

        if let Some(shadow) = shadow {
            written.sort_unstable();
            written.dedup();
            for &slot in &written {
                shadow[slot].fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Random workload plus both checks: the array must match the atomically
/// maintained shadow state and a single-threaded replay of the same seeds.
fn random_rws_checked(transactions: usize, seed: u64) {
    let per_thread = transactions / THREADS;
    info!(
        "random workload: {} transactions over {} threads",
        per_thread * THREADS,
        THREADS
    );

    let array = IntArray::new();
    let shadow: [AtomicU32; CAPACITY] = std::array::from_fn(|_| AtomicU32::new(0));

    spawn_workers(|me| random_rws(&array, me, per_thread, seed, Some(&shadow)));

    for index in 0..CAPACITY {
        assert_eq!(
            array.read_atomic(index) as u32,
            shadow[index].load(Ordering::Relaxed),
            "cell {index} diverged from the shadow state"
        );
    }

    info!("replaying single-threaded");
    let replay = IntArray::new();
    for me in 0..THREADS {
        random_rws(&replay, me, per_thread, seed, None);
    }
    for index in 0..CAPACITY {
        assert_eq!(
            array.read_atomic(index),
            replay.read_atomic(index),
            "cell {index} diverged from the serial replay"
        );
    }
}
