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

//! Shared fixtures for video-out tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::super::buffer::{pixel_format, BufferAttribute, BufferAttributeGroup, TilingMode};
use super::super::presenter::Presenter;
use super::super::{VideoOutContext, VideoOutDriver, BUS_TYPE_MAIN};
use crate::core::amdgpu::{GpuExecutor, InlineExecutor, VAddr};
use crate::core::config::VideoOutConfig;

pub const ADDRS: [VAddr; 3] = [0x1000_0000, 0x1080_0000, 0x1100_0000];

/// Frame recorded by [`RecordingPresenter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Surface(VAddr),
    Blank,
    Last,
}

/// Presenter that remembers everything it was asked to do
#[derive(Default)]
pub struct RecordingPresenter {
    presented: Mutex<Vec<(Frame, bool)>>,
    surfaces: Mutex<Vec<VAddr>>,
    hdr: AtomicBool,
    pub keep_drawing: AtomicBool,
}

impl RecordingPresenter {
    pub fn presented(&self) -> Vec<(Frame, bool)> {
        self.presented.lock().unwrap().clone()
    }

    pub fn surfaces(&self) -> Vec<VAddr> {
        self.surfaces.lock().unwrap().clone()
    }

    pub fn hdr(&self) -> bool {
        self.hdr.load(Ordering::SeqCst)
    }
}

impl Presenter for RecordingPresenter {
    type Frame = Frame;

    fn prepare_frame(&self, _group: &BufferAttributeGroup, address: VAddr) -> Frame {
        Frame::Surface(address)
    }

    fn prepare_blank_frame(&self, _keep_alpha: bool) -> Frame {
        Frame::Blank
    }

    fn prepare_last_frame(&self) -> Frame {
        Frame::Last
    }

    fn present(&self, frame: Frame, is_last: bool) {
        self.presented.lock().unwrap().push((frame, is_last));
    }

    fn set_hdr(&self, enable: bool) {
        self.hdr.store(enable, Ordering::SeqCst);
    }

    fn register_video_out_surface(&self, _group: &BufferAttributeGroup, address: VAddr) {
        self.surfaces.lock().unwrap().push(address);
    }

    fn must_keep_drawing(&self) -> bool {
        self.keep_drawing.load(Ordering::SeqCst)
    }
}

pub fn attribute() -> BufferAttribute {
    BufferAttribute::new(pixel_format::A8R8G8B8_SRGB, TilingMode::Tile, 1920, 1080)
}

pub fn context_with(
    config: VideoOutConfig,
    gpu: Arc<dyn GpuExecutor>,
) -> (VideoOutContext<RecordingPresenter>, Arc<RecordingPresenter>) {
    let presenter = Arc::new(RecordingPresenter::default());
    let mut ctx = VideoOutContext::new(presenter.clone(), gpu);
    ctx.config = config;
    (ctx, presenter)
}

/// Unstarted driver with flips executed inline
pub fn driver() -> (VideoOutDriver<RecordingPresenter>, Arc<RecordingPresenter>) {
    driver_with_config(VideoOutConfig::default())
}

pub fn driver_with_config(
    config: VideoOutConfig,
) -> (VideoOutDriver<RecordingPresenter>, Arc<RecordingPresenter>) {
    let (ctx, presenter) = context_with(config, Arc::new(InlineExecutor));
    (VideoOutDriver::new_unstarted(ctx), presenter)
}

/// Open the main port and register `count` buffers from slot 0
pub fn open_with_buffers(driver: &VideoOutDriver<RecordingPresenter>, count: usize) -> i32 {
    let handle = driver.open(BUS_TYPE_MAIN, 0).unwrap();
    driver
        .register_buffers(handle, 0, &ADDRS[..count], &attribute())
        .unwrap();
    handle
}
