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

//! Video-out event delivery
//!
//! Flip completion and vblank are reported to guests through kernel event
//! queues. The driver only sees them as [`EventSink`] objects.
//!
//! ## Correlation data
//!
//! ```text
//! Bits  | Flip event             | Vblank event
//! ------|------------------------|----------------------
//! 0-15  | internal id 0x0006     | internal id 0x0007
//! 16-63 | flip_arg (48 bits)     | vblank count (48 bits)
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Public event identifiers
pub mod event_id {
    pub const FLIP: u64 = 0x0;
    pub const VBLANK: u64 = 0x1;
}

/// Internal event identifiers carried in the low bits of the event data
pub mod internal_event_id {
    pub const FLIP: u64 = 0x6;
    pub const VBLANK: u64 = 0x7;
}

/// Kernel event filter kinds used by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    VideoOut,
}

impl EventFilter {
    /// Raw kernel filter value
    pub fn raw(self) -> i16 {
        match self {
            EventFilter::VideoOut => -13,
        }
    }
}

/// Something that can receive a triggered event
pub trait EventSink: Send + Sync {
    fn trigger_event(&self, ident: u64, filter: EventFilter, data: u64);
}

const PAYLOAD_SHIFT: u32 = 16;

/// Event data for a completed flip
pub fn flip_event_data(flip_arg: i64) -> u64 {
    internal_event_id::FLIP | ((flip_arg as u64) << PAYLOAD_SHIFT)
}

/// Event data for a vblank tick
pub fn vblank_event_data(count: u64) -> u64 {
    internal_event_id::VBLANK | (count << PAYLOAD_SHIFT)
}

/// Internal event id of event data
pub fn internal_id(data: u64) -> u64 {
    data & 0xFFFF
}

/// Flip argument of flip event data, sign-extended from 48 bits
///
/// # Example
///
/// ```
/// use orbisrx::core::videoout::event::{flip_arg, flip_event_data};
///
/// assert_eq!(flip_arg(flip_event_data(7)), 7);
/// assert_eq!(flip_arg(flip_event_data(-3)), -3);
/// ```
pub fn flip_arg(data: u64) -> i64 {
    (data as i64) >> PAYLOAD_SHIFT
}

/// A triggered event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggeredEvent {
    pub ident: u64,
    pub filter: EventFilter,
    pub data: u64,
}

/// Minimal kernel event queue
///
/// Collects triggered events in order and lets consumers block until one
/// arrives.
#[derive(Debug, Default)]
pub struct EventQueue {
    name: String,
    events: Mutex<VecDeque<TriggeredEvent>>,
    cv: Condvar,
}

impl EventQueue {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            events: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every queued event
    pub fn drain(&self) -> Vec<TriggeredEvent> {
        self.lock().drain(..).collect()
    }

    /// Wait up to `timeout` for an event and pop it
    pub fn wait(&self, timeout: Duration) -> Option<TriggeredEvent> {
        let guard = self.lock();
        let (mut guard, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |events| events.is_empty())
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.pop_front()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<TriggeredEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventSink for EventQueue {
    fn trigger_event(&self, ident: u64, filter: EventFilter, data: u64) {
        self.lock().push_back(TriggeredEvent {
            ident,
            filter,
            data,
        });
        self.cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_data_layout() {
        let data = flip_event_data(0x1234);
        assert_eq!(internal_id(data), internal_event_id::FLIP);
        assert_eq!(data >> 16, 0x1234);
    }

    #[test]
    fn test_vblank_data_layout() {
        let data = vblank_event_data(99);
        assert_eq!(internal_id(data), internal_event_id::VBLANK);
        assert_eq!(data >> 16, 99);
    }

    #[test]
    fn test_queue_records_in_order() {
        let queue = EventQueue::new("test");
        queue.trigger_event(event_id::FLIP, EventFilter::VideoOut, flip_event_data(1));
        queue.trigger_event(event_id::FLIP, EventFilter::VideoOut, flip_event_data(2));

        let args: Vec<i64> = queue.drain().iter().map(|e| flip_arg(e.data)).collect();
        assert_eq!(args, vec![1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_wait_times_out() {
        let queue = EventQueue::new("empty");
        assert!(queue.wait(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn test_filter_value() {
        assert_eq!(EventFilter::VideoOut.raw(), -13);
    }
}
