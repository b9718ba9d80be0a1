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

//! PM4 packet header definitions
//!
//! Every PM4 packet starts with a 32-bit header whose top two bits select the
//! packet type. The remaining bits are interpreted per type:
//!
//! ```text
//! Type 0:  [31:30]=0  [29:16]=count  [15:0]=base register index
//! Type 2:  [31:30]=2  (filler, no payload)
//! Type 3:  [31:30]=3  [29:16]=count  [15:8]=opcode  [1]=shader type  [0]=predicate
//! ```
//!
//! For types 0 and 3 `count` is one less than the number of payload words, so
//! the total packet length is `count + 2` words.

/// Start offset of the header word within a command buffer, in 32-bit words
pub type PacketOffset = usize;

/// Decoded PM4 packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PM4Header {
    /// Register write block starting at `base_index`
    Type0 { base_index: u16, count: u16 },

    /// Reserved header type, never emitted by the driver
    Type1,

    /// Filler packet
    Type2,

    /// Opcoded command packet
    Type3(PM4Type3Header),
}

/// Type-3 header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PM4Type3Header {
    /// Predicated execution flag
    pub predicate: bool,

    /// Compute (true) or graphics (false) shader type
    pub compute: bool,

    /// Raw IT opcode
    pub opcode: u8,

    /// Payload word count minus one
    pub count: u16,
}

impl PM4Type3Header {
    /// Decoded opcode, if it is one this crate knows about
    #[inline]
    pub fn it_opcode(&self) -> Option<PM4ItOpcode> {
        PM4ItOpcode::from_raw(self.opcode)
    }

    /// Number of payload words following the header
    #[inline]
    pub fn body_words(&self) -> usize {
        self.count as usize + 1
    }

    /// Encode this header back into a raw word
    pub fn encode(&self) -> u32 {
        (3u32 << 30)
            | ((self.count as u32 & 0x3FFF) << 16)
            | ((self.opcode as u32) << 8)
            | ((self.compute as u32) << 1)
            | self.predicate as u32
    }
}

impl PM4Header {
    /// Decode a raw header word
    ///
    /// The two-bit type field is inspected first; the rest of the word is only
    /// interpreted through the layout of that type.
    ///
    /// # Example
    ///
    /// ```
    /// use orbisrx::core::amdgpu::pm4::{PM4Header, PM4ItOpcode};
    ///
    /// let header = PM4Header::decode(0xC004_4700);
    /// match header {
    ///     PM4Header::Type3(h) => {
    ///         assert_eq!(h.it_opcode(), Some(PM4ItOpcode::EventWriteEop));
    ///         assert_eq!(h.count, 4);
    ///     }
    ///     _ => unreachable!(),
    /// }
    /// assert_eq!(header.total_words(), Some(6));
    /// ```
    pub fn decode(word: u32) -> Self {
        match word >> 30 {
            0 => PM4Header::Type0 {
                base_index: (word & 0xFFFF) as u16,
                count: ((word >> 16) & 0x3FFF) as u16,
            },
            1 => PM4Header::Type1,
            2 => PM4Header::Type2,
            _ => PM4Header::Type3(PM4Type3Header {
                predicate: word & 0x1 != 0,
                compute: (word >> 1) & 0x1 != 0,
                opcode: ((word >> 8) & 0xFF) as u8,
                count: ((word >> 16) & 0x3FFF) as u16,
            }),
        }
    }

    /// Packet type discriminant (0-3)
    pub fn packet_type(&self) -> u8 {
        match self {
            PM4Header::Type0 { .. } => 0,
            PM4Header::Type1 => 1,
            PM4Header::Type2 => 2,
            PM4Header::Type3(_) => 3,
        }
    }

    /// Total packet length in words, header included
    ///
    /// Returns `None` for type-1 headers, which have no defined length.
    pub fn total_words(&self) -> Option<usize> {
        match self {
            PM4Header::Type0 { count, .. } => Some(*count as usize + 2),
            PM4Header::Type1 => None,
            PM4Header::Type2 => Some(1),
            PM4Header::Type3(h) => Some(h.body_words() + 1),
        }
    }
}

/// Type-3 IT opcodes
///
/// Only the opcodes the command processor and fence detector care about are
/// listed; everything else is carried as a raw byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PM4ItOpcode {
    Nop = 0x10,
    SetBase = 0x11,
    ClearState = 0x12,
    IndexBufferSize = 0x13,
    DispatchDirect = 0x15,
    DispatchIndirect = 0x16,
    DrawIndirect = 0x24,
    DrawIndexIndirect = 0x25,
    IndexBase = 0x26,
    DrawIndex2 = 0x27,
    ContextControl = 0x28,
    IndexType = 0x2A,
    DrawIndexAuto = 0x2D,
    NumInstances = 0x2F,
    WriteData = 0x37,
    WaitRegMem = 0x3C,
    IndirectBuffer = 0x3F,
    CopyData = 0x40,
    EventWrite = 0x46,
    EventWriteEop = 0x47,
    EventWriteEos = 0x48,
    ReleaseMem = 0x49,
    DmaData = 0x50,
    AcquireMem = 0x58,
    SetConfigReg = 0x68,
    SetContextReg = 0x69,
    SetShReg = 0x76,
    SetUconfigReg = 0x79,
}

impl PM4ItOpcode {
    /// Map a raw opcode byte to a known opcode
    pub fn from_raw(raw: u8) -> Option<Self> {
        use PM4ItOpcode::*;
        let op = match raw {
            0x10 => Nop,
            0x11 => SetBase,
            0x12 => ClearState,
            0x13 => IndexBufferSize,
            0x15 => DispatchDirect,
            0x16 => DispatchIndirect,
            0x24 => DrawIndirect,
            0x25 => DrawIndexIndirect,
            0x26 => IndexBase,
            0x27 => DrawIndex2,
            0x28 => ContextControl,
            0x2A => IndexType,
            0x2D => DrawIndexAuto,
            0x2F => NumInstances,
            0x37 => WriteData,
            0x3C => WaitRegMem,
            0x3F => IndirectBuffer,
            0x40 => CopyData,
            0x46 => EventWrite,
            0x47 => EventWriteEop,
            0x48 => EventWriteEos,
            0x49 => ReleaseMem,
            0x50 => DmaData,
            0x58 => AcquireMem,
            0x68 => SetConfigReg,
            0x69 => SetContextReg,
            0x76 => SetShReg,
            0x79 => SetUconfigReg,
            _ => return None,
        };
        Some(op)
    }
}

/// Raw type-2 filler header
pub const TYPE2_NOP: u32 = 0x8000_0000;

/// Build a type-3 header word for `opcode` with `body_words` payload words
///
/// `body_words` must be at least 1.
pub fn type3_header(opcode: PM4ItOpcode, body_words: usize) -> u32 {
    PM4Type3Header {
        predicate: false,
        compute: false,
        opcode: opcode as u8,
        count: (body_words.max(1) - 1) as u16,
    }
    .encode()
}

/// Build a type-0 header word writing `body_words` registers from `base_index`
pub fn type0_header(base_index: u16, body_words: usize) -> u32 {
    ((((body_words.max(1) - 1) as u32) & 0x3FFF) << 16) | base_index as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_type_discriminant() {
        assert_eq!(PM4Header::decode(0x0000_0000).packet_type(), 0);
        assert_eq!(PM4Header::decode(0x4000_0000).packet_type(), 1);
        assert_eq!(PM4Header::decode(TYPE2_NOP).packet_type(), 2);
        assert_eq!(PM4Header::decode(0xC000_1000).packet_type(), 3);
    }

    #[test]
    fn test_type3_fields() {
        let word = type3_header(PM4ItOpcode::WaitRegMem, 6);
        let PM4Header::Type3(h) = PM4Header::decode(word) else {
            panic!("expected type-3 header");
        };
        assert_eq!(h.it_opcode(), Some(PM4ItOpcode::WaitRegMem));
        assert_eq!(h.count, 5);
        assert_eq!(h.body_words(), 6);
        assert!(!h.predicate);
        assert_eq!(h.encode(), word);
    }

    #[test]
    fn test_type0_length() {
        let header = PM4Header::decode(type0_header(0x2C0, 3));
        assert_eq!(
            header,
            PM4Header::Type0 {
                base_index: 0x2C0,
                count: 2
            }
        );
        assert_eq!(header.total_words(), Some(4));
    }

    #[test]
    fn test_type1_has_no_length() {
        assert_eq!(PM4Header::decode(0x7FFF_FFFF).total_words(), None);
    }

    #[test]
    fn test_unknown_opcode() {
        assert_eq!(PM4ItOpcode::from_raw(0xFF), None);
        assert_eq!(PM4ItOpcode::from_raw(0x49), Some(PM4ItOpcode::ReleaseMem));
    }
}
