// Copyright 2025-2026 stm-occ Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! This library implements a small
//! [software transactional memory](https://en.wikipedia.org/wiki/Software_transactional_memory)
//! with optimistic concurrency control.
//!
//! Threads group reads and writes against shared containers into a
//! [`Transaction`]. The body runs without taking any locks; every read
//! records the version it observed and every write stays buffered. At
//! [`commit`](Transaction::commit) the written cells are locked in one
//! global order, the recorded reads are revalidated against the current
//! versions, and only then do the writes become visible, as a single
//! atomic unit. If a conflicting committer got there first, `commit`
//! returns `false` and the caller reruns the body against a fresh
//! transaction. Committed transactions are serializable, and because every
//! committer locks in the same order, commits never deadlock.
//!
//! The coordinator is polymorphic over its containers: anything
//! implementing the [`ReadCapability`] and [`WriteCapability`] pair can
//! take part in a transaction, and one transaction may span several
//! containers. [`TArray`], a fixed-capacity array with per-cell version
//! counters, is the built-in container.
//!
//! # Usage
//!
//! Run a transactional computation with [`atomically`]. It retries the
//! body until a commit succeeds:
//!
//! ```
//! use stm_occ::{atomically, TArray};
//!
//! let account: TArray<i64, 2> = TArray::new();
//!
//! // Move 10 units from cell 0 to cell 1, atomically.
//! atomically(|tx| {
//!     let from = account.read(tx, 0);
//!     let to = account.read(tx, 1);
//!     account.write(tx, 0, from - 10);
//!     account.write(tx, 1, to + 10);
//! });
//!
//! assert_eq!(account.read_atomic(0), -10);
//! assert_eq!(account.read_atomic(1), 10);
//! ```
//!
//! Driving a [`Transaction`] by hand exposes the commit result, e.g. for
//! a custom retry policy (see also [`atomically_with_control`]):
//!
//! ```
//! use stm_occ::{TArray, Transaction};
//!
//! let array: TArray<i32, 4> = TArray::new();
//!
//! let mut tx = Transaction::new();
//! let v = array.read(&mut tx, 0);
//! array.write(&mut tx, 0, v + 1);
//! assert!(tx.commit());
//! ```
//!
//! # Transaction safety
//!
//! A transaction body may run several times before one of its runs
//! commits, and the values it reads can already be stale while it is still
//! running. Three rules follow:
//!
//! * Don't perform side effects in the body, especially no IO. A rerun
//!   would repeat them. If a side effect is unavoidable, register a
//!   compensation on the abort set
//!   ([`register_abort`](Transaction::register_abort)) and be prepared to
//!   [`abort`](Transaction::abort) explicitly.
//! * Don't let the body make decisions that must hold beyond the
//!   transaction from possibly stale reads; only committed values are
//!   consistent.
//! * Don't share one transaction between threads. Each transaction belongs
//!   to the thread that created it; the containers are the shared part.
//!
//! Keep transactions short. The more cells a transaction touches, the more
//! likely a concurrent committer invalidates one of its reads and forces a
//! rerun.

mod participant;
mod tarray;
mod transaction;


pub use participant::{ReadCapability, ReadPayload, Uid, WriteCapability, WritePayload};
pub use tarray::{ArrayError, TArray};
pub use transaction::{atomically, atomically_with_control, Transaction, TransactionControl};
