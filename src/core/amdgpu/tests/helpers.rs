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

//! Command buffer builders for tests

use super::super::packets::*;
use super::super::pm4::TYPE2_NOP;

/// Accumulates packets and remembers where each one starts
#[derive(Default)]
pub struct CmdBuilder {
    pub words: Vec<u32>,
}

impl CmdBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `packet` and return its header offset
    pub fn push(&mut self, packet: Vec<u32>) -> usize {
        let offset = self.words.len();
        self.words.extend(packet);
        offset
    }

    pub fn nop(&mut self) -> usize {
        self.push(vec![TYPE2_NOP])
    }
}

pub fn eos_fence(address: VAddr, value: u32) -> Vec<u32> {
    EventWriteEos {
        event_type: 0x15,
        address,
        command: EosCommand::SignalFence,
        data: value,
    }
    .encode()
}

pub fn eop(
    address: VAddr,
    int_sel: InterruptSelect,
    data_sel: DataSelect,
    value: u64,
) -> Vec<u32> {
    EventWriteEop {
        event_type: 0x04,
        address,
        int_sel,
        data_sel,
        data_lo: value as u32,
        data_hi: (value >> 32) as u32,
    }
    .encode()
}

pub fn release_mem(address: VAddr, data_sel: DataSelect, value: u64) -> Vec<u32> {
    ReleaseMem {
        event_type: 0x14,
        dst_sel: 0,
        int_sel: InterruptSelect::None,
        data_sel,
        address,
        data_lo: value as u32,
        data_hi: (value >> 32) as u32,
    }
    .encode()
}

pub fn write_data(address: VAddr, wr_confirm: bool, data: &[u32]) -> Vec<u32> {
    WriteData {
        dst_sel: 5,
        wr_one_addr: false,
        wr_confirm,
        engine_sel: 0,
        address,
        data,
    }
    .encode()
}

pub fn wait_mem(address: VAddr, function: WaitFunction, mask: u32, reference: u32) -> Vec<u32> {
    WaitRegMem {
        function,
        mem_space: MemSpace::Memory,
        engine: 0,
        address,
        reference,
        mask,
        poll_interval: 10,
    }
    .encode()
}
