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

//! Video-out port state
//!
//! A port is one display output. It owns the registered buffers and their
//! attribute groups, the flip and vblank status blocks, the per-buffer flip
//! labels and the event sinks to notify.
//!
//! ## Locks
//!
//! ```text
//! Lock           | Guards                                     | Writers
//! ---------------|--------------------------------------------|---------------------
//! state          | buffers, groups, flip status, flip rate,   | submitters, present
//!                | previous index, HDR flag, event sinks      | thread, HLE calls
//! vblank         | vblank status (+ condvar for waiters)      | present thread
//! labels         | flip labels (+ condvar for waiters)        | GPU, present thread
//! ```
//!
//! `is_open` is only flipped while the driver's own mutex is held.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use super::buffer::{
    BufferAttribute, BufferAttributeGroup, VideoOutBuffer, MAX_DISPLAY_BUFFERS,
    MAX_DISPLAY_BUFFER_GROUPS,
};
use super::event::EventSink;
use crate::core::amdgpu::VAddr;
use crate::core::error::VideoOutError;
use crate::core::timing::{ProcessTime, Tsc};

/// Flip progress counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlipStatus {
    /// Completed flips
    pub count: u64,
    /// Process time of the last completed flip
    pub process_time: ProcessTime,
    /// TSC of the last completed flip
    pub tsc: Tsc,
    /// Argument of the last completed flip
    pub flip_arg: i64,
    /// TSC of the last accepted submission
    pub submit_tsc: Tsc,
    /// Pending flips tied to an end-of-pipe event
    pub gc_queue_num: i32,
    /// All pending flips
    pub flip_pending_num: i32,
    /// Buffer currently on screen, -1 for none or blank
    pub current_buffer: i32,
}

impl Default for FlipStatus {
    fn default() -> Self {
        Self {
            count: 0,
            process_time: 0,
            tsc: 0,
            flip_arg: 0,
            submit_tsc: 0,
            gc_queue_num: 0,
            flip_pending_num: 0,
            current_buffer: -1,
        }
    }
}

/// Vblank counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VblankStatus {
    pub count: u64,
    pub process_time: ProcessTime,
    pub tsc: Tsc,
}

/// Output resolution of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionStatus {
    pub full_width: u32,
    pub full_height: u32,
    pub pane_width: u32,
    pub pane_height: u32,
    /// Refresh rate in Hz
    pub refresh_rate: u32,
}

impl ResolutionStatus {
    pub fn new(width: u32, height: u32, refresh_rate: u32) -> Self {
        Self {
            full_width: width,
            full_height: height,
            pane_width: width,
            pane_height: height,
            refresh_rate,
        }
    }
}

/// State guarded by the port mutex
pub(super) struct PortState {
    pub buffers: [VideoOutBuffer; MAX_DISPLAY_BUFFERS],
    pub groups: [BufferAttributeGroup; MAX_DISPLAY_BUFFER_GROUPS],
    pub flip_status: FlipStatus,
    /// Flip every `flip_rate + 1` vblanks
    pub flip_rate: u32,
    /// Last presented buffer, -1 for none
    pub prev_index: i32,
    pub is_hdr: bool,
    pub flip_events: Vec<Arc<dyn EventSink>>,
    pub vblank_events: Vec<Arc<dyn EventSink>>,
}

impl PortState {
    fn new() -> Self {
        Self {
            buffers: [VideoOutBuffer::UNREGISTERED; MAX_DISPLAY_BUFFERS],
            groups: [BufferAttributeGroup::default(); MAX_DISPLAY_BUFFER_GROUPS],
            flip_status: FlipStatus::default(),
            flip_rate: 0,
            prev_index: -1,
            is_hdr: false,
            flip_events: Vec::new(),
            vblank_events: Vec::new(),
        }
    }

    pub fn num_registered_buffers(&self) -> usize {
        self.buffers.iter().filter(|b| b.is_registered()).count()
    }

    fn find_free_group(&self) -> Option<usize> {
        self.groups.iter().position(|g| !g.is_occupied)
    }
}

fn same_sink(a: &Arc<dyn EventSink>, b: &Arc<dyn EventSink>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Surfaces created by a successful registration
pub(super) struct Registration {
    pub group_index: i32,
    pub group: BufferAttributeGroup,
    pub addresses: Vec<VAddr>,
}

/// One display output
pub struct VideoOutPort {
    is_open: AtomicBool,
    resolution: ResolutionStatus,
    state: Mutex<PortState>,
    vblank: Mutex<VblankStatus>,
    vblank_cv: Condvar,
    labels: Mutex<[i32; MAX_DISPLAY_BUFFERS]>,
    label_cv: Condvar,
}

impl VideoOutPort {
    pub fn new(resolution: ResolutionStatus) -> Self {
        Self {
            is_open: AtomicBool::new(false),
            resolution,
            state: Mutex::new(PortState::new()),
            vblank: Mutex::new(VblankStatus::default()),
            vblank_cv: Condvar::new(),
            labels: Mutex::new([0; MAX_DISPLAY_BUFFERS]),
            label_cv: Condvar::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Acquire)
    }

    /// Caller must hold the driver mutex
    pub(super) fn set_open(&self, open: bool) {
        self.is_open.store(open, Ordering::Release);
    }

    pub fn resolution(&self) -> ResolutionStatus {
        self.resolution
    }

    pub(super) fn lock_state(&self) -> MutexGuard<'_, PortState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(super) fn lock_vblank(&self) -> MutexGuard<'_, VblankStatus> {
        self.vblank
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(super) fn notify_vblank(&self) {
        self.vblank_cv.notify_all();
    }

    fn lock_labels(&self) -> MutexGuard<'_, [i32; MAX_DISPLAY_BUFFERS]> {
        self.labels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn flip_status(&self) -> FlipStatus {
        self.lock_state().flip_status
    }

    pub fn vblank_status(&self) -> VblankStatus {
        *self.lock_vblank()
    }

    /// Block until the vblank count advances or `timeout` elapses
    ///
    /// Returns `true` if a vblank happened.
    pub fn wait_vblank(&self, timeout: Duration) -> bool {
        let guard = self.lock_vblank();
        let start = guard.count;
        let (guard, _) = self
            .vblank_cv
            .wait_timeout_while(guard, timeout, |status| status.count == start)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.count != start
    }

    pub fn buffer(&self, index: usize) -> Option<VideoOutBuffer> {
        self.lock_state().buffers.get(index).copied()
    }

    pub fn group(&self, index: usize) -> Option<BufferAttributeGroup> {
        self.lock_state().groups.get(index).copied()
    }

    pub fn num_registered_buffers(&self) -> usize {
        self.lock_state().num_registered_buffers()
    }

    pub fn flip_rate(&self) -> u32 {
        self.lock_state().flip_rate
    }

    pub fn is_hdr(&self) -> bool {
        self.lock_state().is_hdr
    }

    pub fn buffer_label(&self, index: usize) -> Option<i32> {
        self.lock_labels().get(index).copied()
    }

    /// Write a flip label and wake label waiters
    pub fn set_buffer_label(&self, index: usize, value: i32) -> Result<(), VideoOutError> {
        let mut labels = self.lock_labels();
        let label = labels.get_mut(index).ok_or(VideoOutError::InvalidIndex)?;
        *label = value;
        self.label_cv.notify_all();
        Ok(())
    }

    /// Block until the label of `index` equals `value` or `timeout` elapses
    pub fn wait_buffer_label(&self, index: usize, value: i32, timeout: Duration) -> bool {
        if index >= MAX_DISPLAY_BUFFERS {
            return false;
        }
        let guard = self.lock_labels();
        let (guard, _) = self
            .label_cv
            .wait_timeout_while(guard, timeout, |labels| labels[index] != value)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard[index] == value
    }

    /// Validate and claim slots for `addresses`
    ///
    /// All checks run before any state changes, so a failed call leaves the
    /// port untouched.
    pub(super) fn register_buffers(
        &self,
        start_index: usize,
        addresses: &[VAddr],
        attribute: &BufferAttribute,
    ) -> Result<Registration, VideoOutError> {
        let mut state = self.lock_state();

        let group_index = state.find_free_group().ok_or_else(|| {
            log::error!("VideoOut: no free buffer attribute group");
            VideoOutError::NoEmptySlot
        })?;

        let end = start_index
            .checked_add(addresses.len())
            .filter(|&end| end <= MAX_DISPLAY_BUFFERS)
            .ok_or_else(|| {
                log::error!(
                    "VideoOut: buffers {}..+{} exceed {} slots",
                    start_index,
                    addresses.len(),
                    MAX_DISPLAY_BUFFERS
                );
                VideoOutError::InvalidValue
            })?;

        if let Some(busy) = (start_index..end).find(|&i| state.buffers[i].is_registered()) {
            log::error!("VideoOut: buffer slot {} already registered", busy);
            return Err(VideoOutError::SlotOccupied);
        }

        attribute.validate()?;

        let group = BufferAttributeGroup {
            is_occupied: true,
            attrib: *attribute,
        };
        state.groups[group_index] = group;
        for (slot, &address) in state.buffers[start_index..end].iter_mut().zip(addresses) {
            *slot = VideoOutBuffer {
                group_index: group_index as i32,
                address_left: address,
                address_right: 0,
            };
        }
        drop(state);

        {
            let mut labels = self.lock_labels();
            for label in &mut labels[start_index..end] {
                *label = 0;
            }
            self.label_cv.notify_all();
        }

        log::info!(
            "VideoOut: registered {} buffers at slot {} in group {} ({}x{}, pitch {}, format 0x{:08X})",
            addresses.len(),
            start_index,
            group_index,
            attribute.width,
            attribute.height,
            attribute.pitch_in_pixel,
            attribute.pixel_format
        );

        Ok(Registration {
            group_index: group_index as i32,
            group,
            addresses: addresses.to_vec(),
        })
    }

    pub(super) fn unregister_buffers(&self, group_index: i32) -> Result<(), VideoOutError> {
        let mut state = self.lock_state();
        let index = usize::try_from(group_index)
            .ok()
            .filter(|&i| i < MAX_DISPLAY_BUFFER_GROUPS && state.groups[i].is_occupied)
            .ok_or_else(|| {
                log::error!("VideoOut: group {} is not registered", group_index);
                VideoOutError::InvalidValue
            })?;

        state.groups[index].is_occupied = false;
        for buffer in state.buffers.iter_mut() {
            if buffer.group_index == group_index {
                buffer.group_index = -1;
            }
        }
        log::info!("VideoOut: unregistered group {}", group_index);
        Ok(())
    }

    pub(super) fn add_flip_event(&self, sink: Arc<dyn EventSink>) {
        let mut state = self.lock_state();
        if !state.flip_events.iter().any(|s| same_sink(s, &sink)) {
            state.flip_events.push(sink);
        }
    }

    pub(super) fn delete_flip_event(&self, sink: &Arc<dyn EventSink>) -> Result<(), VideoOutError> {
        let mut state = self.lock_state();
        let pos = state
            .flip_events
            .iter()
            .position(|s| same_sink(s, sink))
            .ok_or(VideoOutError::InvalidEvent)?;
        state.flip_events.remove(pos);
        Ok(())
    }

    pub(super) fn add_vblank_event(&self, sink: Arc<dyn EventSink>) {
        let mut state = self.lock_state();
        if !state.vblank_events.iter().any(|s| same_sink(s, &sink)) {
            state.vblank_events.push(sink);
        }
    }

    pub(super) fn delete_vblank_event(
        &self,
        sink: &Arc<dyn EventSink>,
    ) -> Result<(), VideoOutError> {
        let mut state = self.lock_state();
        let pos = state
            .vblank_events
            .iter()
            .position(|s| same_sink(s, sink))
            .ok_or(VideoOutError::InvalidEvent)?;
        state.vblank_events.remove(pos);
        Ok(())
    }

    /// Reset a port being closed
    pub(super) fn reset_on_close(&self) {
        let mut state = self.lock_state();
        if !state.flip_events.is_empty() {
            log::warn!(
                "VideoOut: closing port with {} flip event sinks still registered",
                state.flip_events.len()
            );
        }
        debug_assert!(
            state.flip_events.is_empty(),
            "flip events must be removed before closing the port"
        );
        state.flip_rate = 0;
        state.prev_index = -1;
    }
}
