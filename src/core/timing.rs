// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Host timing utilities
//!
//! This module provides the two clocks the video-out status structures are
//! stamped with, plus the frame pacer used by the presentation thread.
//!
//! # Architecture
//!
//! - [`HostClock`] reports guest-visible process time (microseconds) and a
//!   timestamp counter, both measured from a fixed origin.
//! - [`FrameTimer`] brackets one loop iteration between `start()` and `end()`.
//!   `end()` sleeps out whatever is left of the interval. It is the only
//!   throttle of the presentation loop.
//!
//! # Example
//!
//! ```
//! use orbisrx::core::timing::FrameTimer;
//! use std::time::{Duration, Instant};
//!
//! let mut timer = FrameTimer::new(Duration::from_millis(2));
//! let begin = Instant::now();
//! timer.start();
//! timer.end();
//! assert!(begin.elapsed() >= Duration::from_millis(2));
//! ```

use std::thread;
use std::time::{Duration, Instant};

/// Microseconds of process time
pub type ProcessTime = u64;

/// Timestamp counter ticks
pub type Tsc = u64;

/// Host clock shared by all status counters
///
/// The TSC ticks at one tick per nanosecond.
#[derive(Debug, Clone, Copy)]
pub struct HostClock {
    origin: Instant,
}

impl HostClock {
    /// Timestamp counter frequency in ticks per second
    pub const TSC_FREQUENCY: u64 = 1_000_000_000;

    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Process time in microseconds since the clock was created
    pub fn process_time(&self) -> ProcessTime {
        self.origin.elapsed().as_micros() as ProcessTime
    }

    /// Current timestamp counter value
    pub fn read_tsc(&self) -> Tsc {
        self.origin.elapsed().as_nanos() as Tsc
    }

    pub fn tsc_frequency(&self) -> u64 {
        Self::TSC_FREQUENCY
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Precise repeating timer for frame pacing
///
/// # Design
///
/// Deadlines advance by exactly one interval per iteration so short
/// iterations do not accumulate drift. When an iteration overruns by more
/// than a full interval, the schedule resynchronizes to the current time
/// instead of bursting to catch up.
#[derive(Debug)]
pub struct FrameTimer {
    interval: Duration,
    deadline: Option<Instant>,
    iteration_start: Instant,
}

impl FrameTimer {
    /// Remaining time below which `end()` spins instead of sleeping
    const SPIN_THRESHOLD: Duration = Duration::from_micros(500);

    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
            iteration_start: Instant::now(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Mark the start of an iteration
    pub fn start(&mut self) {
        let now = Instant::now();
        self.iteration_start = now;
        match self.deadline {
            Some(deadline) if deadline + self.interval > now => {}
            _ => self.deadline = Some(now),
        }
    }

    /// Whether the current iteration still has time left in its interval
    pub fn has_budget_remaining(&self) -> bool {
        self.remaining() > Duration::ZERO
    }

    /// Time left until the end of the current iteration
    pub fn remaining(&self) -> Duration {
        let end = self.deadline.unwrap_or(self.iteration_start) + self.interval;
        end.saturating_duration_since(Instant::now())
    }

    /// Sleep out the rest of the current interval
    pub fn end(&mut self) {
        let deadline = self.deadline.unwrap_or(self.iteration_start) + self.interval;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let left = deadline - now;
            if left > Self::SPIN_THRESHOLD {
                thread::sleep(left - Self::SPIN_THRESHOLD);
            } else {
                std::hint::spin_loop();
            }
        }
        self.deadline = Some(deadline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_monotonic() {
        let clock = HostClock::new();
        let t0 = clock.read_tsc();
        let p0 = clock.process_time();
        thread::sleep(Duration::from_millis(2));
        assert!(clock.read_tsc() > t0);
        assert!(clock.process_time() >= p0 + 1000);
    }

    #[test]
    fn test_timer_paces_iterations() {
        let mut timer = FrameTimer::new(Duration::from_millis(3));
        let begin = Instant::now();
        for _ in 0..4 {
            timer.start();
            timer.end();
        }
        assert!(begin.elapsed() >= Duration::from_millis(12));
    }

    #[test]
    fn test_budget_consumed_after_interval() {
        let mut timer = FrameTimer::new(Duration::from_millis(1));
        timer.start();
        assert!(timer.remaining() <= Duration::from_millis(1));
        thread::sleep(Duration::from_millis(3));
        assert!(!timer.has_budget_remaining());
    }

    #[test]
    fn test_overrun_resynchronizes() {
        let mut timer = FrameTimer::new(Duration::from_millis(1));
        timer.start();
        thread::sleep(Duration::from_millis(5));
        timer.end();

        // The next iteration gets a full interval again
        timer.start();
        assert!(timer.has_budget_remaining());
    }
}
