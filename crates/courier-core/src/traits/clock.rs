// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wall-clock abstraction.

/// Source of the current wall-clock time in unix seconds.
///
/// Countdown begin times and self-destruct deadlines are expressed in the
/// same 32-bit second resolution the message timestamps use.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> i32;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i32 {
        chrono::Utc::now().timestamp() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_past_2020() {
        assert!(SystemClock.now() > 1_577_836_800);
    }
}
