// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! FIFO of status updates waiting to be sent to the hub.
//!
//! Producers are the pub/sub delivery context; the session is the only
//! consumer. Order is never changed: a multi-speed fan relies on its "off"
//! updates reaching the hub before the "on" one.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::StatusUpdate;

/// Thread-safe, unbounded FIFO of [`StatusUpdate`]s.
///
/// Cloning yields another handle to the same queue.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    inner: Arc<Mutex<VecDeque<StatusUpdate>>>,
}

impl CommandQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends updates, keeping their order.
    pub fn push_all(&self, updates: impl IntoIterator<Item = StatusUpdate>) {
        self.inner.lock().extend(updates);
    }

    /// Removes the oldest update.
    #[must_use]
    pub fn pop(&self) -> Option<StatusUpdate> {
        self.inner.lock().pop_front()
    }

    /// Number of pending updates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Drops every pending update and returns how many there were.
    pub fn clear(&self) -> usize {
        let mut queue = self.inner.lock();
        let dropped = queue.len();
        queue.clear();
        dropped
    }
}
