// Copyright 2025-2026 stm-occ Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::Arc;

use crate::participant::{ReadCapability, ReadPayload, Uid, WriteCapability, WritePayload};

/// One recorded read: the capability that took it paired with its payload.
pub struct ReadEntry {
    cap: Arc<dyn ReadCapability>,
    payload: ReadPayload,
}

impl ReadEntry {
    pub fn new(cap: Arc<dyn ReadCapability>, payload: ReadPayload) -> ReadEntry {
        ReadEntry { cap, payload }
    }

    pub fn uid(&self) -> Uid {
        self.cap.uid(&self.payload)
    }

    pub fn check(&self) -> bool {
        self.cap.check(&self.payload)
    }

    pub fn is_locked(&self) -> bool {
        self.cap.is_locked(&self.payload)
    }
}

/// One recorded write. `Clone` is cheap (two reference counts), so the
/// commit protocol can copy the write set into its lock sequence.
#[derive(Clone)]
pub struct WriteEntry {
    cap: Arc<dyn WriteCapability>,
    payload: WritePayload,
}

impl WriteEntry {
    pub fn new(cap: Arc<dyn WriteCapability>, payload: WritePayload) -> WriteEntry {
        WriteEntry { cap, payload }
    }

    pub fn uid(&self) -> Uid {
        self.cap.uid(&self.payload)
    }

    pub fn lock(&self) {
        self.cap.lock(&self.payload);
    }

    pub fn unlock(&self) {
        self.cap.unlock(&self.payload);
    }

    pub fn install(&self) {
        self.cap.install(&self.payload);
    }

    pub fn undo(&self) {
        self.cap.undo(&self.payload);
    }

    pub fn after_commit(&self) {
        self.cap.after_commit(&self.payload);
    }
}
