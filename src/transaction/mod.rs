// Copyright 2025-2026 stm-occ Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

mod entry;


use std::sync::Arc;

use log::{debug, trace};

use crate::participant::{ReadCapability, ReadPayload, Uid, WriteCapability, WritePayload};

use self::entry::{ReadEntry, WriteEntry};

/// A transaction tracks every read and tentative write issued through
/// participating containers, then makes the writes visible as a single
/// atomic unit on [`commit`](Transaction::commit).
///
/// The four sequences are append-only and keep insertion order. Duplicate
/// writes to the same cell are allowed; the last one wins at install time.
///
/// A transaction belongs to one thread. `commit` and
/// [`abort`](Transaction::abort) consume it, so a terminated transaction
/// cannot be reused; retries run against a fresh one.
pub struct Transaction {
    reads: Vec<ReadEntry>,
    writes: Vec<WriteEntry>,
    on_abort: Vec<WriteEntry>,
    on_commit: Vec<WriteEntry>,
}

impl Transaction {
    /// Create an empty transaction.
    pub fn new() -> Transaction {
        Transaction {
            reads: Vec::new(),
            writes: Vec::new(),
            on_abort: Vec::new(),
            on_commit: Vec::new(),
        }
    }

    /// Append a read to the read set. Containers call this from their own
    /// read operations after capturing the cell's current version in the
    /// payload.
    pub fn record_read(&mut self, cap: Arc<dyn ReadCapability>, payload: ReadPayload) {
        self.reads.push(ReadEntry::new(cap, payload));
    }

    /// Append a tentative write to the write set. Nothing becomes visible
    /// to other threads before `commit`.
    pub fn record_write(&mut self, cap: Arc<dyn WriteCapability>, payload: WritePayload) {
        self.writes.push(WriteEntry::new(cap, payload));
    }

    /// Register a compensation that runs (as `undo`) if the transaction
    /// aborts. Meant for external side effects performed during the
    /// transaction body.
    pub fn register_abort(&mut self, cap: Arc<dyn WriteCapability>, payload: WritePayload) {
        self.on_abort.push(WriteEntry::new(cap, payload));
    }

    /// Register a hook that runs (as `after_commit`) once the transaction
    /// has committed and released all its locks.
    pub fn register_commit(&mut self, cap: Arc<dyn WriteCapability>, payload: WritePayload) {
        self.on_commit.push(WriteEntry::new(cap, payload));
    }

    /// Try to make the recorded writes globally visible.
    ///
    /// Two-phase locking over the writes plus optimistic validation of the
    /// reads:
    ///
    /// 1. lock every written cell, in global [`Uid`] order, each exactly
    ///    once;
    /// 2. revalidate the read set against the current cell versions;
    /// 3. on success, install the writes in insertion order;
    /// 4. release every lock, then run the commit hooks (success) or the
    ///    abort compensations (failure).
    ///
    /// Returns `true` if the writes are now visible, `false` if a
    /// conflicting committer intervened and the caller should retry with a
    /// fresh transaction.
    pub fn commit(self) -> bool {
        let lock_sequence = self.lock_sequence();

        for write in &lock_sequence {
            write.lock();
        }

        let success = self.validate(&lock_sequence);

        if success {
            // Installs follow the original write order, not the sorted lock
            // sequence, so repeated writes to one cell end on the last value.
            for write in &self.writes {
                write.install();
            }
        }

        // The deduplicated sequence guarantees one unlock per lock.
        for write in &lock_sequence {
            write.unlock();
        }

        if success {
            trace!(
                "committed: {} reads, {} writes, {} cells locked",
                self.reads.len(),
                self.writes.len(),
                lock_sequence.len()
            );
            for hook in &self.on_commit {
                hook.after_commit();
            }
        } else {
            self.run_abort_set();
        }

        success
    }

    /// Discard the transaction, running the registered abort compensations
    /// in insertion order. The write set is left untouched; nothing was
    /// installed.
    pub fn abort(self) {
        self.run_abort_set();
    }

    /// The write set sorted by cell identifier with duplicates removed:
    /// the order in which locks are taken and later released.
    fn lock_sequence(&self) -> Vec<WriteEntry> {
        let mut sequence = self.writes.clone();
        sequence.sort_by_key(|write| write.uid());
        sequence.dedup_by_key(|write| write.uid());
        sequence
    }

    /// A read validates if its version is still current and its cell is
    /// either unlocked or locked by this very transaction.
    fn validate(&self, lock_sequence: &[WriteEntry]) -> bool {
        self.reads.iter().all(|read| {
            let valid =
                read.check() && (!read.is_locked() || Self::holds(lock_sequence, read.uid()));
            if !valid {
                debug!("aborting: read of cell {:?} no longer valid", read.uid());
            }
            valid
        })
    }

    fn holds(lock_sequence: &[WriteEntry], uid: Uid) -> bool {
        lock_sequence
            .binary_search_by_key(&uid, |write| write.uid())
            .is_ok()
    }

    fn run_abort_set(&self) {
        for hook in &self.on_abort {
            hook.undo();
        }
    }
}

impl Default for Transaction {
    fn default() -> Transaction {
        Transaction::new()
    }
}

/// Decision returned by the control function of
/// [`atomically_with_control`]: run the transaction body again or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionControl {
    Retry,
    Abort,
}

/// Run `f` against fresh transactions until one of them commits, then
/// return the value of the successful run.
///
/// The body may observe values that a concurrent committer later
/// invalidates; the failed commit discards them and the body reruns, so it
/// must be free of side effects other than those going through
/// transactional containers (or registered on the abort set).
///
/// ```
/// use stm_occ::{atomically, TArray};
///
/// let array: TArray<i32, 8> = TArray::new();
/// atomically(|tx| {
///     let x = array.read(tx, 0);
///     array.write(tx, 1, x + 1);
/// });
/// assert_eq!(array.read_atomic(1), 1);
/// ```
pub fn atomically<T, F>(mut f: F) -> T
where
    F: FnMut(&mut Transaction) -> T,
{
    loop {
        let mut transaction = Transaction::new();
        let value = f(&mut transaction);
        if transaction.commit() {
            return value;
        }
    }
}

/// Like [`atomically`], but after every failed commit the `control`
/// function decides whether to retry.
///
/// `control` receives the number of failed attempts so far and can bound
/// retries or insert a backoff before answering
/// [`TransactionControl::Retry`]. Returns `None` if `control` gave up.
///
/// ```
/// use stm_occ::{atomically_with_control, TArray, TransactionControl};
///
/// let array: TArray<i32, 8> = TArray::new();
/// let value = atomically_with_control(
///     |attempts| {
///         if attempts < 16 {
///             TransactionControl::Retry
///         } else {
///             TransactionControl::Abort
///         }
///     },
///     |tx| array.read(tx, 0),
/// );
/// assert_eq!(value, Some(0));
/// ```
pub fn atomically_with_control<T, F, C>(mut control: C, mut f: F) -> Option<T>
where
    F: FnMut(&mut Transaction) -> T,
    C: FnMut(usize) -> TransactionControl,
{
    let mut attempts = 0;
    loop {
        let mut transaction = Transaction::new();
        let value = f(&mut transaction);
        if transaction.commit() {
            return Some(value);
        }
        attempts += 1;
        if let TransactionControl::Abort = control(attempts) {
            debug!("giving up after {} failed commits", attempts);
            return None;
        }
    }
}
