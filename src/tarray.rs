// Copyright 2025-2026 stm-occ Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::array;
use std::fmt::{self, Debug};
use std::hint;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::participant::{ReadCapability, ReadPayload, Uid, WriteCapability, WritePayload};
use crate::transaction::Transaction;

/// Error reported by the array at the point of use.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ArrayError {
    #[error("index {index} out of bounds for array of {capacity} cells")]
    OutOfBounds { index: usize, capacity: usize },
}

/// One cell: the committed value, its version counter and the lock bit the
/// commit protocol takes while publishing.
struct Slot<T> {
    value: RwLock<T>,
    version: AtomicU64,
    locked: AtomicBool,
}

impl<T> Slot<T> {
    fn new(value: T) -> Slot<T> {
        Slot {
            value: RwLock::new(value),
            version: AtomicU64::new(0),
            locked: AtomicBool::new(false),
        }
    }
}

/// Payload of a recorded read: the cell and the version observed.
struct SlotRead {
    index: usize,
    version: u64,
}

/// Payload of a tentative write: the cell and the value to publish.
struct SlotWrite<T> {
    index: usize,
    value: T,
}

/// Shared state behind a [`TArray`] handle. Implements both coordinator
/// capabilities; its heap address doubles as the owner part of every cell
/// identifier.
struct ArrayCore<T, const N: usize> {
    slots: [Slot<T>; N],
}

impl<T, const N: usize> ArrayCore<T, N>
where
    T: Send + Sync + 'static,
{
    fn address(&self) -> usize {
        self as *const ArrayCore<T, N> as *const () as usize
    }

    fn read_payload(payload: &ReadPayload) -> &SlotRead {
        match payload.downcast_ref::<SlotRead>() {
            Some(read) => read,
            None => unreachable!("read payload from another participant"),
        }
    }

    fn write_payload(payload: &WritePayload) -> &SlotWrite<T> {
        match payload.downcast_ref::<SlotWrite<T>>() {
            Some(write) => write,
            None => unreachable!("write payload from another participant"),
        }
    }
}

impl<T, const N: usize> ReadCapability for ArrayCore<T, N>
where
    T: Send + Sync + 'static,
{
    fn uid(&self, payload: &ReadPayload) -> Uid {
        Uid::new(self.address(), Self::read_payload(payload).index)
    }

    fn check(&self, payload: &ReadPayload) -> bool {
        let read = Self::read_payload(payload);
        self.slots[read.index].version.load(Ordering::Acquire) == read.version
    }

    fn is_locked(&self, payload: &ReadPayload) -> bool {
        let read = Self::read_payload(payload);
        self.slots[read.index].locked.load(Ordering::Acquire)
    }
}

impl<T, const N: usize> WriteCapability for ArrayCore<T, N>
where
    T: Clone + Send + Sync + 'static,
{
    fn uid(&self, payload: &WritePayload) -> Uid {
        Uid::new(self.address(), Self::write_payload(payload).index)
    }

    fn lock(&self, payload: &WritePayload) {
        let slot = &self.slots[Self::write_payload(payload).index];
        while slot
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            hint::spin_loop();
        }
    }

    fn unlock(&self, payload: &WritePayload) {
        let slot = &self.slots[Self::write_payload(payload).index];
        slot.locked.store(false, Ordering::Release);
    }

    fn install(&self, payload: &WritePayload) {
        let write = Self::write_payload(payload);
        let slot = &self.slots[write.index];
        *slot.value.write() = write.value.clone();
        slot.version.fetch_add(1, Ordering::Release);
    }

    // Writes stay buffered in the transaction until install, so an aborted
    // transaction has touched nothing and there is nothing to compensate.
    fn undo(&self, _payload: &WritePayload) {}

    fn after_commit(&self, _payload: &WritePayload) {}
}

/// A fixed-capacity transactional array of `N` values of type `T`.
///
/// The handle is a thin reference; clone it to share the same array with
/// other threads.
///
/// ```
/// use stm_occ::{atomically, TArray};
///
/// let array: TArray<i32, 4> = TArray::new();
/// atomically(|tx| {
///     let v = array.read(tx, 0);
///     array.write(tx, 0, v + 1);
/// });
/// assert_eq!(array.read_atomic(0), 1);
/// ```
pub struct TArray<T, const N: usize> {
    core: Arc<ArrayCore<T, N>>,
}

impl<T, const N: usize> Clone for TArray<T, N> {
    fn clone(&self) -> TArray<T, N> {
        TArray {
            core: self.core.clone(),
        }
    }
}

impl<T, const N: usize> TArray<T, N>
where
    T: Clone + Send + Sync + 'static,
{
    /// Number of cells, fixed for the lifetime of the array.
    pub const CAPACITY: usize = N;

    /// Create an array with every cell holding `T::default()`.
    pub fn new() -> TArray<T, N>
    where
        T: Default,
    {
        TArray {
            core: Arc::new(ArrayCore {
                slots: array::from_fn(|_| Slot::new(T::default())),
            }),
        }
    }

    pub fn len(&self) -> usize {
        N
    }

    pub fn is_empty(&self) -> bool {
        N == 0
    }

    /// Read the currently committed value of a cell without a transaction.
    ///
    /// Panics if `index` is out of bounds.
    pub fn read_atomic(&self, index: usize) -> T {
        match self.try_read_atomic(index) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible variant of [`read_atomic`](TArray::read_atomic).
    pub fn try_read_atomic(&self, index: usize) -> Result<T, ArrayError> {
        let slot = self.core.slots.get(index).ok_or(ArrayError::OutOfBounds {
            index,
            capacity: N,
        })?;
        Ok(slot.value.read().clone())
    }

    /// Read a cell inside a transaction: records the observed version on
    /// `transaction` and returns the cell's current value.
    ///
    /// The returned value may already be outdated by the time the body
    /// finishes; commit-time validation prevents such a transaction from
    /// committing.
    ///
    /// Panics if `index` is out of bounds.
    pub fn read(&self, transaction: &mut Transaction, index: usize) -> T {
        match self.try_read(transaction, index) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible variant of [`read`](TArray::read).
    pub fn try_read(&self, transaction: &mut Transaction, index: usize) -> Result<T, ArrayError> {
        let slot = self.core.slots.get(index).ok_or(ArrayError::OutOfBounds {
            index,
            capacity: N,
        })?;

        // Version first: an install racing between the two loads can only
        // make validation fail, never pass against a stale value.
        let version = slot.version.load(Ordering::Acquire);
        let value = slot.value.read().clone();

        transaction.record_read(self.core.clone(), Arc::new(SlotRead { index, version }));
        Ok(value)
    }

    /// Record a tentative write. The value becomes visible to other
    /// threads only if the transaction commits.
    ///
    /// Panics if `index` is out of bounds.
    pub fn write(&self, transaction: &mut Transaction, index: usize, value: T) {
        if let Err(err) = self.try_write(transaction, index, value) {
            panic!("{err}");
        }
    }

    /// Fallible variant of [`write`](TArray::write).
    pub fn try_write(
        &self,
        transaction: &mut Transaction,
        index: usize,
        value: T,
    ) -> Result<(), ArrayError> {
        if index >= N {
            return Err(ArrayError::OutOfBounds {
                index,
                capacity: N,
            });
        }
        transaction.record_write(self.core.clone(), Arc::new(SlotWrite { index, value }));
        Ok(())
    }
}

impl<T, const N: usize> Default for TArray<T, N>
where
    T: Clone + Default + Send + Sync + 'static,
{
    fn default() -> TArray<T, N> {
        TArray::new()
    }
}

/// Prints the committed cell values. The snapshot is taken cell by cell,
/// so concurrent committers may leave it internally inconsistent.
impl<T, const N: usize> Debug for TArray<T, N>
where
    T: Clone + Debug + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries((0..N).map(|index| self.read_atomic(index)))
            .finish()
    }
}
