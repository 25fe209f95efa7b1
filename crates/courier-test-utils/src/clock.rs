// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Manually driven clock.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use courier_core::Clock;

/// A [`Clock`] whose time only changes through [`set`](Self::set) and
/// [`advance`](Self::advance). Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI32>,
}

impl ManualClock {
    pub fn new(now: i32) -> Self {
        Self {
            now: Arc::new(AtomicI32::new(now)),
        }
    }

    pub fn set(&self, now: i32) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i32) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i32 {
        self.now.load(Ordering::SeqCst)
    }
}
