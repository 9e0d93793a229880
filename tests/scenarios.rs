// Copyright 2025-2026 stm-occ Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! End-to-end scenarios: four worker threads hammer one shared array with
//! conflicting transactions, then the final state is checked against what
//! a serial execution would have produced. The `stress` binary runs the
//! same workloads at full volume.

use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use stm_occ::{atomically, TArray, Transaction};

const CAPACITY: usize = 100;
const THREADS: usize = 4;
const OPS_PER_TRANSACTION: usize = 10;

type IntArray = TArray<i32, CAPACITY>;

/// Run `worker(me)` for `me` in `0..THREADS` on scoped threads and join.
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

/// Every thread writes its own cell but reads everybody else's, so the
/// transactions conflict constantly yet each write lands untouched.
#[test]
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
/// also writes cell 0. Once it commits, every other flood has a stale read
/// of cell 0 and must revalidate into a no-op, so the last thread wins.
#[test]
fn blind_writes_have_designated_winner() {
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

/// Overlapping read-modify-writes: thread `me` increments every cell whose
/// index satisfies `index % THREADS >= me`, so cell `i` ends up incremented
/// by exactly `i % THREADS + 1` threads.
#[test]
fn interfering_read_modify_writes() {
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

/// Seeded random mix of reads and read-then-increments. The generator is
/// reseeded per attempt so a retried transaction replays the very same
/// operations. Committed increments on distinct cells are mirrored into
/// `shadow` when given.
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
                    // Increment the current value; a read plus a write
                    // counts as two operations.
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

/// The transactional array must agree cell-for-cell with an atomically
/// maintained shadow state, and with a single-threaded replay of the same
/// seeds. The full-volume version of this check lives in the `stress`
/// binary.
#[test]
fn random_workload_matches_shadow_and_serial_replay() {
    const TRANSACTIONS: usize = 100_000;
    let per_thread = TRANSACTIONS / THREADS;
    let seed = 0;

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

/// Three writes to one cell in a single transaction: the last value wins.
#[test]
fn single_transaction_duplicate_writes() {
    let array: TArray<i32, 4> = TArray::new();

    let mut tx = Transaction::new();
    array.write(&mut tx, 2, 10);
    array.write(&mut tx, 2, 20);
    array.write(&mut tx, 2, 30);
    assert!(tx.commit());

    assert_eq!(array.read_atomic(2), 30);
}

/// A transaction holding a stale read must fail its commit and leave the
/// interfering writer's value in place.
#[test]
fn version_conflict_forces_abort() {
    let array: TArray<i32, 4> = TArray::new();

    let mut stale = Transaction::new();
    assert_eq!(array.read(&mut stale, 0), 0);
    array.write(&mut stale, 1, 99);

    // Another transaction commits a write to cell 0 in between.
    let mut winner = Transaction::new();
    array.write(&mut winner, 0, 7);
    assert!(winner.commit());

    assert!(!stale.commit());
    assert_eq!(array.read_atomic(0), 7);
    assert_eq!(array.read_atomic(1), 0);
}

/// An explicitly aborted transaction has no observable effect.
#[test]
fn explicit_abort_has_no_effect() {
    let array: TArray<i32, 8> = TArray::new();

    let mut tx = Transaction::new();
    let current = array.read(&mut tx, 0);
    array.write(&mut tx, 0, current + 1);
    array.write(&mut tx, 5, 42);
    tx.abort();

    for index in 0..8 {
        assert_eq!(array.read_atomic(index), 0);
    }
}
