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

//! Command-buffer fence detection
//!
//! Guest drivers synchronize the CPU with the GPU by having the command
//! stream write a value to memory (EOP/EOS events, RELEASE_MEM, confirmed
//! WRITE_DATA) and then polling that location, either from the CPU or from a
//! later WAIT_REG_MEM in the same stream.
//!
//! [`FenceDetector`] walks a command buffer once and records every such write
//! as a fence keyed by the memory location it targets. When a WAIT_REG_MEM
//! later in the same buffer polls a recorded location and the latched value
//! already satisfies the wait, the fence is dropped: the wait cannot block, so
//! the write is not a synchronization point anybody stalls on.
//!
//! The command processor then asks [`FenceDetector::is_fence`] with the word
//! offset of a packet header while executing the same buffer.
//!
//! ## Limitations
//!
//! Type-0 register writes are never interpreted. A fence expressed only as a
//! raw register write is not detected.

use serde::Serialize;
use std::collections::HashMap;

use super::packets::{
    EosCommand, EventWriteEop, EventWriteEos, InterruptSelect, MemSpace, ReleaseMem, VAddr,
    WaitRegMem, WriteData,
};
use super::pm4::{PM4Header, PM4ItOpcode, PacketOffset};
use super::walker::{Packet, PacketWalker};

/// A recorded fence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Fence {
    /// Word offset of the packet that writes the fence
    pub offset: PacketOffset,

    /// Memory location written by the packet
    pub address: VAddr,

    /// Latched value
    pub value: u64,
}

/// Fence table for one command buffer
///
/// # Example
///
/// ```
/// use orbisrx::core::amdgpu::FenceDetector;
/// use orbisrx::core::amdgpu::packets::{DataSelect, EventWriteEop, InterruptSelect};
///
/// let cmd = EventWriteEop {
///     event_type: 0x04,
///     address: 0x10_0000,
///     int_sel: InterruptSelect::IrqWhenWriteConfirm,
///     data_sel: DataSelect::Data32Low,
///     data_lo: 42,
///     data_hi: 0,
/// }
/// .encode();
///
/// let detector = FenceDetector::new(&cmd);
/// assert!(detector.is_fence(0));
/// assert_eq!(detector.fence_value(0x10_0000), Some(42));
/// ```
#[derive(Debug, Default)]
pub struct FenceDetector {
    /// Memory location -> fence
    fences: HashMap<VAddr, Fence>,

    /// Header offset -> memory location, for O(1) `is_fence`
    headers: HashMap<PacketOffset, VAddr>,

    /// Set when the scan ended on a corrupt packet
    truncated: bool,
}

impl FenceDetector {
    /// Scan `cmd` and build its fence table
    pub fn new(cmd: &[u32]) -> Self {
        let mut detector = Self::default();
        detector.detect_fences(cmd);
        detector
    }

    /// Whether the packet whose header sits at `offset` is a live fence
    #[inline]
    pub fn is_fence(&self, offset: PacketOffset) -> bool {
        self.headers.contains_key(&offset)
    }

    /// Latched value of the fence targeting `address`
    pub fn fence_value(&self, address: VAddr) -> Option<u64> {
        self.fences.get(&address).map(|fence| fence.value)
    }

    /// Fence written by the packet at `offset`
    pub fn fence_at(&self, offset: PacketOffset) -> Option<&Fence> {
        self.headers
            .get(&offset)
            .and_then(|address| self.fences.get(address))
    }

    /// All live fences, ordered by packet offset
    pub fn fences(&self) -> Vec<Fence> {
        let mut fences: Vec<Fence> = self.fences.values().copied().collect();
        fences.sort_by_key(|fence| fence.offset);
        fences
    }

    pub fn len(&self) -> usize {
        self.fences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }

    /// Whether the scan stopped early on a corrupt or truncated packet
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    fn detect_fences(&mut self, cmd: &[u32]) {
        let mut walker = PacketWalker::new(cmd);
        for packet in walker.by_ref() {
            match packet.header {
                PM4Header::Type0 { base_index, count } => {
                    log::error!(
                        "PM4: unsupported type-0 packet at word {} (base 0x{:04X}, count {})",
                        packet.offset,
                        base_index,
                        count
                    );
                }
                PM4Header::Type2 => {}
                PM4Header::Type3(header) => {
                    if let Some(opcode) = header.it_opcode() {
                        self.handle_type3(opcode, &packet);
                    }
                }
                // The walker never yields type-1 packets
                PM4Header::Type1 => {}
            }
        }
        self.truncated = walker.is_truncated();
    }

    fn handle_type3(&mut self, opcode: PM4ItOpcode, packet: &Packet<'_>) {
        let body = packet.body();
        match opcode {
            PM4ItOpcode::EventWriteEos => {
                if let Some(eos) = EventWriteEos::parse(body) {
                    if eos.command == EosCommand::SignalFence {
                        self.record(packet.offset, eos.address, eos.data as u64);
                    }
                }
            }
            PM4ItOpcode::EventWriteEop => {
                if let Some(eop) = EventWriteEop::parse(body) {
                    if eop.int_sel != InterruptSelect::None {
                        let value = eop.data().unwrap_or(0);
                        self.record(packet.offset, eop.address, value);
                    }
                }
            }
            PM4ItOpcode::ReleaseMem => {
                if let Some(release) = ReleaseMem::parse(body) {
                    if let Some(value) = release.data() {
                        self.record(packet.offset, release.address, value);
                    }
                }
            }
            PM4ItOpcode::WriteData => {
                if let Some(write) = WriteData::parse(body) {
                    if write.wr_confirm {
                        if let Some(value) = write.value() {
                            self.record(packet.offset, write.address, value);
                        }
                    }
                }
            }
            PM4ItOpcode::WaitRegMem => {
                if let Some(wait) = WaitRegMem::parse(body) {
                    self.resolve_wait(&wait);
                }
            }
            _ => {}
        }
    }

    fn record(&mut self, offset: PacketOffset, address: VAddr, value: u64) {
        let previous = self.fences.insert(
            address,
            Fence {
                offset,
                address,
                value,
            },
        );
        if let Some(previous) = previous {
            if previous.offset != offset {
                self.headers.remove(&previous.offset);
            }
        }
        self.headers.insert(offset, address);
    }

    fn resolve_wait(&mut self, wait: &WaitRegMem) {
        if wait.mem_space != MemSpace::Memory {
            return;
        }
        let Some(fence) = self.fences.get(&wait.address).copied() else {
            return;
        };
        if wait.is_satisfied(fence.value) {
            log::trace!(
                "PM4: wait on 0x{:X} already satisfied by value {}, dropping fence at word {}",
                wait.address,
                fence.value,
                fence.offset
            );
            self.fences.remove(&wait.address);
            self.headers.remove(&fence.offset);
        }
    }
}
