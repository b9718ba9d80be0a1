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

//! PM4 packet walker
//!
//! Splits a flat command buffer into packets without copying. The walker
//! looks at the header under the cursor, computes the packet length and hands
//! out a borrowed view of exactly that many words.
//!
//! A packet whose declared length runs past the end of the buffer (or a
//! type-1 header, which has no length at all) ends the walk. Nothing after a
//! corrupt header can be trusted to be aligned to a packet boundary.

use super::pm4::{PM4Header, PacketOffset};

/// One decoded packet borrowed from the command buffer
#[derive(Debug, Clone, Copy)]
pub struct Packet<'a> {
    /// Word offset of the header within the buffer
    pub offset: PacketOffset,

    /// Decoded header
    pub header: PM4Header,

    /// All words of the packet, header first
    pub words: &'a [u32],
}

impl<'a> Packet<'a> {
    /// Payload words (everything after the header)
    #[inline]
    pub fn body(&self) -> &'a [u32] {
        &self.words[1..]
    }
}

/// Forward-only iterator over the packets of a command buffer
///
/// # Example
///
/// ```
/// use orbisrx::core::amdgpu::PacketWalker;
/// use orbisrx::core::amdgpu::pm4::{type3_header, PM4ItOpcode, TYPE2_NOP};
///
/// let cmd = [
///     TYPE2_NOP,
///     type3_header(PM4ItOpcode::Nop, 2),
///     0xDEAD_BEEF,
///     0xCAFE_F00D,
/// ];
/// let offsets: Vec<usize> = PacketWalker::new(&cmd).map(|p| p.offset).collect();
/// assert_eq!(offsets, vec![0, 1]);
/// ```
#[derive(Debug, Clone)]
pub struct PacketWalker<'a> {
    cmd: &'a [u32],
    cursor: usize,
    truncated: bool,
}

impl<'a> PacketWalker<'a> {
    pub fn new(cmd: &'a [u32]) -> Self {
        Self {
            cmd,
            cursor: 0,
            truncated: false,
        }
    }

    /// Current cursor position in words
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Whether the walk ended on a corrupt or truncated packet
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    fn stop(&mut self) {
        self.truncated = true;
        self.cursor = self.cmd.len();
    }
}

impl<'a> Iterator for PacketWalker<'a> {
    type Item = Packet<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.cursor;
        let word = *self.cmd.get(offset)?;
        let header = PM4Header::decode(word);

        let Some(len) = header.total_words() else {
            log::warn!(
                "PM4: type-1 header 0x{:08X} at word {}, stopping scan",
                word,
                offset
            );
            self.stop();
            return None;
        };

        let remaining = self.cmd.len() - offset;
        if len > remaining {
            log::warn!(
                "PM4: packet at word {} claims {} words but only {} remain, stopping scan",
                offset,
                len,
                remaining
            );
            self.stop();
            return None;
        }

        self.cursor += len;
        Some(Packet {
            offset,
            header,
            words: &self.cmd[offset..offset + len],
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.cmd.len() - self.cursor))
    }
}
