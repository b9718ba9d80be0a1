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

//! Test fixtures for common test scenarios

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use orbisrx::core::amdgpu::packets::{
    DataSelect, EosCommand, EventWriteEop, EventWriteEos, InterruptSelect, VAddr, WriteData,
};
use orbisrx::core::amdgpu::pm4::{type3_header, PM4ItOpcode, TYPE2_NOP};
use orbisrx::core::amdgpu::GpuCommandQueue;
use orbisrx::core::config::VideoOutConfig;
use orbisrx::core::videoout::buffer::{pixel_format, BufferAttribute, TilingMode};
use orbisrx::core::videoout::{NullPresenter, VideoOutContext, VideoOutDriver};

/// Base of the fence addresses used by [`fenced_command_buffer`]
pub const FENCE_BASE: VAddr = 0x0000_0050_0000;

/// Expected fence produced by a fixture
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedFence {
    pub offset: usize,
    pub address: VAddr,
    pub value: u64,
}

/// Command buffer with `count` fences interleaved with filler packets
///
/// Fences cycle through EOS, EOP and confirmed WRITE_DATA, each at its own
/// address.
#[allow(dead_code)]
pub fn fenced_command_buffer(count: usize) -> (Vec<u32>, Vec<ExpectedFence>) {
    let mut words = Vec::new();
    let mut fences = Vec::new();

    for i in 0..count {
        words.push(TYPE2_NOP);
        words.push(type3_header(PM4ItOpcode::Nop, 1));
        words.push(0);

        let address = FENCE_BASE + i as u64 * 8;
        let value = 0x100 + i as u64;
        let offset = words.len();
        let packet = match i % 3 {
            0 => EventWriteEos {
                event_type: 0x15,
                address,
                command: EosCommand::SignalFence,
                data: value as u32,
            }
            .encode(),
            1 => EventWriteEop {
                event_type: 0x04,
                address,
                int_sel: InterruptSelect::IrqWhenWriteConfirm,
                data_sel: DataSelect::Data32Low,
                data_lo: value as u32,
                data_hi: 0,
            }
            .encode(),
            _ => WriteData {
                dst_sel: 5,
                wr_one_addr: false,
                wr_confirm: true,
                engine_sel: 0,
                address,
                data: &[value as u32],
            }
            .encode(),
        };
        words.extend(packet);
        fences.push(ExpectedFence {
            offset,
            address,
            value,
        });
    }

    (words, fences)
}

/// Attribute for a 1080p tiled surface
#[allow(dead_code)]
pub fn surface_attribute() -> BufferAttribute {
    BufferAttribute::new(pixel_format::A8R8G8B8_SRGB, TilingMode::Tile, 1920, 1080)
}

/// Fast pacing for tests that run the presentation thread
#[allow(dead_code)]
pub fn fast_config() -> VideoOutConfig {
    VideoOutConfig {
        fps_limit_enabled: true,
        fps_limit: 500,
        ..VideoOutConfig::default()
    }
}

/// Running driver with a null presenter and a real GPU thread
#[allow(dead_code)]
pub struct RunningDriver {
    pub driver: VideoOutDriver<NullPresenter>,
    pub presenter: Arc<NullPresenter>,
    pub gpu: Arc<GpuCommandQueue>,
}

#[allow(dead_code)]
pub fn start_driver(config: VideoOutConfig) -> RunningDriver {
    let gpu = Arc::new(GpuCommandQueue::new().expect("spawn GPU thread"));
    let presenter = Arc::new(NullPresenter::new());
    let mut ctx = VideoOutContext::new(presenter.clone(), gpu.clone());
    ctx.config = config;
    let driver = VideoOutDriver::new(ctx).expect("spawn presentation thread");
    RunningDriver {
        driver,
        presenter,
        gpu,
    }
}

/// Poll `condition` until it holds or `timeout` elapses
#[allow(dead_code)]
pub fn poll_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}
