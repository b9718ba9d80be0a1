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

//! Presentation back end interface
//!
//! The video-out driver never renders. It asks a [`Presenter`] to turn a guest
//! surface into a displayable frame and later to present that frame.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::buffer::BufferAttributeGroup;
use crate::core::amdgpu::VAddr;

/// Rendering back end used by the video-out driver
///
/// `prepare_*` may be called from any submitter thread (or the GPU thread);
/// `present` and `set_hdr` are only called from the presentation thread.
pub trait Presenter: Send + Sync + 'static {
    /// Opaque prepared frame
    type Frame: Send + 'static;

    /// Build a frame from a registered guest surface
    fn prepare_frame(&self, group: &BufferAttributeGroup, address: VAddr) -> Self::Frame;

    /// Build an empty frame
    fn prepare_blank_frame(&self, keep_alpha: bool) -> Self::Frame;

    /// Reuse the most recently presented frame
    fn prepare_last_frame(&self) -> Self::Frame;

    /// Present `frame`. `is_last` marks a redraw of the previous frame.
    fn present(&self, frame: Self::Frame, is_last: bool);

    fn set_hdr(&self, enable: bool);

    /// Prepare back-end resources for a newly registered surface
    fn register_video_out_surface(&self, group: &BufferAttributeGroup, address: VAddr);

    /// Whether overlays need a redraw even when no flip is pending
    fn must_keep_drawing(&self) -> bool {
        false
    }
}

/// Frame produced by [`NullPresenter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullFrame {
    Surface { address: VAddr, width: u32, height: u32 },
    Blank,
    Last,
}

/// Presenter that discards frames and only counts them
#[derive(Debug, Default)]
pub struct NullPresenter {
    presented: AtomicU64,
    redrawn: AtomicU64,
    surfaces: AtomicU64,
    hdr: AtomicBool,
}

impl NullPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames presented, redraws included
    pub fn presented(&self) -> u64 {
        self.presented.load(Ordering::Relaxed)
    }

    /// Redraws of the last frame
    pub fn redrawn(&self) -> u64 {
        self.redrawn.load(Ordering::Relaxed)
    }

    pub fn registered_surfaces(&self) -> u64 {
        self.surfaces.load(Ordering::Relaxed)
    }

    pub fn is_hdr(&self) -> bool {
        self.hdr.load(Ordering::Relaxed)
    }
}

impl Presenter for NullPresenter {
    type Frame = NullFrame;

    fn prepare_frame(&self, group: &BufferAttributeGroup, address: VAddr) -> NullFrame {
        NullFrame::Surface {
            address,
            width: group.attrib.width,
            height: group.attrib.height,
        }
    }

    fn prepare_blank_frame(&self, _keep_alpha: bool) -> NullFrame {
        NullFrame::Blank
    }

    fn prepare_last_frame(&self) -> NullFrame {
        NullFrame::Last
    }

    fn present(&self, frame: NullFrame, is_last: bool) {
        self.presented.fetch_add(1, Ordering::Relaxed);
        if is_last {
            self.redrawn.fetch_add(1, Ordering::Relaxed);
        }
        log::trace!("NullPresenter: present {:?} (last={})", frame, is_last);
    }

    fn set_hdr(&self, enable: bool) {
        self.hdr.store(enable, Ordering::Relaxed);
    }

    fn register_video_out_surface(&self, group: &BufferAttributeGroup, address: VAddr) {
        self.surfaces.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "NullPresenter: surface 0x{:X} {}x{}",
            address,
            group.attrib.width,
            group.attrib.height
        );
    }
}
