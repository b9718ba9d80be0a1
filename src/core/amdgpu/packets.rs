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

//! Typed views of the synchronization packets
//!
//! Each packet is parsed from its payload words (header excluded). A payload
//! shorter than the packet's fixed layout yields `None`.
//!
//! ```text
//! EVENT_WRITE_EOS   w1 event   w2 addr_lo  w3 [15:0] addr_hi [31:29] command  w4 data
//! EVENT_WRITE_EOP   w1 event   w2 addr_lo  w3 [15:0] addr_hi [25:24] int_sel [31:29] data_sel
//!                   w4 data_lo w5 data_hi
//! RELEASE_MEM       w1 event   w2 [17:16] dst_sel [26:24] int_sel [31:29] data_sel
//!                   w3 addr_lo w4 addr_hi w5 data_lo w6 data_hi
//! WRITE_DATA        w1 [11:8] dst_sel [16] wr_one_addr [20] wr_confirm [31:30] engine
//!                   w2 addr_lo w3 addr_hi w4.. data
//! WAIT_REG_MEM      w1 [2:0] function [4] mem_space [8] engine
//!                   w2 addr_lo w3 addr_hi w4 reference w5 mask w6 poll_interval
//! ```

use super::pm4::{type3_header, PM4ItOpcode};

/// Guest virtual address
pub type VAddr = u64;

#[inline]
fn field(word: u32, shift: u32, bits: u32) -> u32 {
    (word >> shift) & ((1u32 << bits) - 1)
}

#[inline]
fn make_u64(lo: u32, hi: u32) -> u64 {
    lo as u64 | ((hi as u64) << 32)
}

/// EVENT_WRITE_EOS command field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EosCommand {
    GdsStore,
    SignalFence,
    Other(u32),
}

impl EosCommand {
    fn from_raw(raw: u32) -> Self {
        match raw {
            1 => EosCommand::GdsStore,
            2 => EosCommand::SignalFence,
            other => EosCommand::Other(other),
        }
    }

    fn raw(self) -> u32 {
        match self {
            EosCommand::GdsStore => 1,
            EosCommand::SignalFence => 2,
            EosCommand::Other(raw) => raw & 0x7,
        }
    }
}

/// End-of-shader event write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWriteEos {
    pub event_type: u32,
    pub address: VAddr,
    pub command: EosCommand,
    pub data: u32,
}

impl EventWriteEos {
    pub const BODY_WORDS: usize = 4;

    pub fn parse(body: &[u32]) -> Option<Self> {
        let body = body.get(..Self::BODY_WORDS)?;
        Some(Self {
            event_type: field(body[0], 0, 6),
            address: make_u64(body[1], field(body[2], 0, 16)),
            command: EosCommand::from_raw(field(body[2], 29, 3)),
            data: body[3],
        })
    }

    pub fn encode(&self) -> Vec<u32> {
        vec![
            type3_header(PM4ItOpcode::EventWriteEos, Self::BODY_WORDS),
            self.event_type & 0x3F,
            self.address as u32,
            ((self.address >> 32) as u32 & 0xFFFF) | (self.command.raw() << 29),
            self.data,
        ]
    }
}

/// Interrupt select of EOP-style packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptSelect {
    None,
    IrqOnly,
    IrqWhenWriteConfirm,
    Undocumented,
}

impl InterruptSelect {
    fn from_raw(raw: u32) -> Self {
        match raw {
            0 => InterruptSelect::None,
            1 => InterruptSelect::IrqOnly,
            2 => InterruptSelect::IrqWhenWriteConfirm,
            _ => InterruptSelect::Undocumented,
        }
    }

    fn raw(self) -> u32 {
        match self {
            InterruptSelect::None => 0,
            InterruptSelect::IrqOnly => 1,
            InterruptSelect::IrqWhenWriteConfirm => 2,
            InterruptSelect::Undocumented => 3,
        }
    }
}

/// Data select of EOP-style packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSelect {
    None,
    Data32Low,
    Data64,
    GpuClock64,
    PerfCounter,
    Reserved(u32),
}

impl DataSelect {
    fn from_raw(raw: u32) -> Self {
        match raw {
            0 => DataSelect::None,
            1 => DataSelect::Data32Low,
            2 => DataSelect::Data64,
            3 => DataSelect::GpuClock64,
            4 => DataSelect::PerfCounter,
            other => DataSelect::Reserved(other),
        }
    }

    fn raw(self) -> u32 {
        match self {
            DataSelect::None => 0,
            DataSelect::Data32Low => 1,
            DataSelect::Data64 => 2,
            DataSelect::GpuClock64 => 3,
            DataSelect::PerfCounter => 4,
            DataSelect::Reserved(raw) => raw & 0x7,
        }
    }

    /// Value written by the packet when it carries an immediate payload
    fn immediate(self, lo: u32, hi: u32) -> Option<u64> {
        match self {
            DataSelect::Data32Low => Some(lo as u64),
            DataSelect::Data64 => Some(make_u64(lo, hi)),
            _ => None,
        }
    }
}

/// End-of-pipe event write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWriteEop {
    pub event_type: u32,
    pub address: VAddr,
    pub int_sel: InterruptSelect,
    pub data_sel: DataSelect,
    pub data_lo: u32,
    pub data_hi: u32,
}

impl EventWriteEop {
    pub const BODY_WORDS: usize = 5;

    pub fn parse(body: &[u32]) -> Option<Self> {
        let body = body.get(..Self::BODY_WORDS)?;
        Some(Self {
            event_type: field(body[0], 0, 6),
            address: make_u64(body[1], field(body[2], 0, 16)),
            int_sel: InterruptSelect::from_raw(field(body[2], 24, 2)),
            data_sel: DataSelect::from_raw(field(body[2], 29, 3)),
            data_lo: body[3],
            data_hi: body[4],
        })
    }

    /// Immediate value written, for 32 and 64-bit data selects
    pub fn data(&self) -> Option<u64> {
        self.data_sel.immediate(self.data_lo, self.data_hi)
    }

    pub fn encode(&self) -> Vec<u32> {
        vec![
            type3_header(PM4ItOpcode::EventWriteEop, Self::BODY_WORDS),
            self.event_type & 0x3F,
            self.address as u32,
            ((self.address >> 32) as u32 & 0xFFFF)
                | (self.int_sel.raw() << 24)
                | (self.data_sel.raw() << 29),
            self.data_lo,
            self.data_hi,
        ]
    }
}

/// Release memory (EOP with cache actions)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseMem {
    pub event_type: u32,
    pub dst_sel: u32,
    pub int_sel: InterruptSelect,
    pub data_sel: DataSelect,
    pub address: VAddr,
    pub data_lo: u32,
    pub data_hi: u32,
}

impl ReleaseMem {
    pub const BODY_WORDS: usize = 6;

    pub fn parse(body: &[u32]) -> Option<Self> {
        let body = body.get(..Self::BODY_WORDS)?;
        Some(Self {
            event_type: field(body[0], 0, 6),
            dst_sel: field(body[1], 16, 2),
            int_sel: InterruptSelect::from_raw(field(body[1], 24, 3)),
            data_sel: DataSelect::from_raw(field(body[1], 29, 3)),
            address: make_u64(body[2], body[3]),
            data_lo: body[4],
            data_hi: body[5],
        })
    }

    pub fn data(&self) -> Option<u64> {
        self.data_sel.immediate(self.data_lo, self.data_hi)
    }

    pub fn encode(&self) -> Vec<u32> {
        vec![
            type3_header(PM4ItOpcode::ReleaseMem, Self::BODY_WORDS),
            self.event_type & 0x3F,
            ((self.dst_sel & 0x3) << 16)
                | (self.int_sel.raw() << 24)
                | (self.data_sel.raw() << 29),
            self.address as u32,
            (self.address >> 32) as u32,
            self.data_lo,
            self.data_hi,
        ]
    }
}

/// Write immediate data to memory or registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteData<'a> {
    pub dst_sel: u32,
    pub wr_one_addr: bool,
    pub wr_confirm: bool,
    pub engine_sel: u32,
    pub address: VAddr,
    pub data: &'a [u32],
}

impl<'a> WriteData<'a> {
    /// Control and address words preceding the data
    pub const FIXED_WORDS: usize = 3;

    pub fn parse(body: &'a [u32]) -> Option<Self> {
        if body.len() < Self::FIXED_WORDS {
            return None;
        }
        Some(Self {
            dst_sel: field(body[0], 8, 4),
            wr_one_addr: field(body[0], 16, 1) != 0,
            wr_confirm: field(body[0], 20, 1) != 0,
            engine_sel: field(body[0], 30, 2),
            address: make_u64(body[1], body[2]),
            data: &body[Self::FIXED_WORDS..],
        })
    }

    /// Payload as a single value, when it fits in 64 bits
    pub fn value(&self) -> Option<u64> {
        match self.data {
            [lo] => Some(*lo as u64),
            [lo, hi] => Some(make_u64(*lo, *hi)),
            _ => None,
        }
    }

    pub fn encode(&self) -> Vec<u32> {
        let mut words = Vec::with_capacity(1 + Self::FIXED_WORDS + self.data.len());
        words.push(type3_header(
            PM4ItOpcode::WriteData,
            Self::FIXED_WORDS + self.data.len(),
        ));
        words.push(
            ((self.dst_sel & 0xF) << 8)
                | ((self.wr_one_addr as u32) << 16)
                | ((self.wr_confirm as u32) << 20)
                | ((self.engine_sel & 0x3) << 30),
        );
        words.push(self.address as u32);
        words.push((self.address >> 32) as u32);
        words.extend_from_slice(self.data);
        words
    }
}

/// WAIT_REG_MEM compare function
///
/// The three-bit field has one reserved encoding (7), which is rejected when
/// the packet is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitFunction {
    Always,
    LessThan,
    LessThanEqual,
    Equal,
    NotEqual,
    GreaterThanEqual,
    GreaterThan,
}

impl WaitFunction {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(WaitFunction::Always),
            1 => Some(WaitFunction::LessThan),
            2 => Some(WaitFunction::LessThanEqual),
            3 => Some(WaitFunction::Equal),
            4 => Some(WaitFunction::NotEqual),
            5 => Some(WaitFunction::GreaterThanEqual),
            6 => Some(WaitFunction::GreaterThan),
            _ => None,
        }
    }

    fn raw(self) -> u32 {
        self as u32
    }

    /// Evaluate `value <fn> reference`
    pub fn test(self, value: u32, reference: u32) -> bool {
        match self {
            WaitFunction::Always => true,
            WaitFunction::LessThan => value < reference,
            WaitFunction::LessThanEqual => value <= reference,
            WaitFunction::Equal => value == reference,
            WaitFunction::NotEqual => value != reference,
            WaitFunction::GreaterThanEqual => value >= reference,
            WaitFunction::GreaterThan => value > reference,
        }
    }
}

/// Where WAIT_REG_MEM polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemSpace {
    Register,
    Memory,
}

/// Wait on a register or memory location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitRegMem {
    pub function: WaitFunction,
    pub mem_space: MemSpace,
    pub engine: u32,
    pub address: VAddr,
    pub reference: u32,
    pub mask: u32,
    pub poll_interval: u32,
}

impl WaitRegMem {
    pub const BODY_WORDS: usize = 6;

    pub fn parse(body: &[u32]) -> Option<Self> {
        let body = body.get(..Self::BODY_WORDS)?;
        let function = match WaitFunction::from_raw(field(body[0], 0, 3)) {
            Some(function) => function,
            None => {
                log::error!(
                    "WAIT_REG_MEM with reserved compare function {}",
                    field(body[0], 0, 3)
                );
                return None;
            }
        };
        Some(Self {
            function,
            mem_space: if field(body[0], 4, 1) != 0 {
                MemSpace::Memory
            } else {
                MemSpace::Register
            },
            engine: field(body[0], 8, 1),
            address: make_u64(body[1], body[2]),
            reference: body[3],
            mask: body[4],
            poll_interval: body[5],
        })
    }

    /// Whether `value` already satisfies the wait condition
    pub fn is_satisfied(&self, value: u64) -> bool {
        self.function.test(value as u32 & self.mask, self.reference)
    }

    pub fn encode(&self) -> Vec<u32> {
        let space = matches!(self.mem_space, MemSpace::Memory) as u32;
        vec![
            type3_header(PM4ItOpcode::WaitRegMem, Self::BODY_WORDS),
            self.function.raw() | (space << 4) | ((self.engine & 0x1) << 8),
            self.address as u32,
            (self.address >> 32) as u32,
            self.reference,
            self.mask,
            self.poll_interval,
        ]
    }
}
