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

//! AMD GPU (Liverpool) command-buffer support
//!
//! The PS4 GPU consumes PM4 command buffers: flat arrays of 32-bit words made
//! of variable-length packets. This module provides:
//! - [`pm4`]: header decoding and opcodes
//! - [`packets`]: typed views of the synchronization packets
//! - [`PacketWalker`]: zero-copy packet iteration
//! - [`FenceDetector`]: one-pass fence table construction
//! - [`GpuCommandQueue`]: the command processor's execution context
//!
//! # References
//!
//! - AMD "Southern Islands" / "Sea Islands" programming guides, PM4 packet chapter

mod command_queue;
mod fence;
pub mod packets;
pub mod pm4;
#[cfg(test)]
mod tests;
mod walker;

pub use command_queue::{GpuCommand, GpuCommandQueue, GpuExecutor, InlineExecutor};
pub use fence::{Fence, FenceDetector};
pub use packets::VAddr;
pub use walker::{Packet, PacketWalker};

/// Read a little-endian PM4 dump into words
///
/// # Errors
///
/// Returns [`crate::core::EmulatorError::InvalidCommandBuffer`] if the byte
/// length is not a multiple of four.
///
/// # Example
///
/// ```
/// use orbisrx::core::amdgpu::words_from_bytes;
///
/// let words = words_from_bytes(&[0x00, 0x00, 0x00, 0x80]).unwrap();
/// assert_eq!(words, vec![0x8000_0000]);
/// assert!(words_from_bytes(&[0x00, 0x00]).is_err());
/// ```
pub fn words_from_bytes(bytes: &[u8]) -> crate::core::Result<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        return Err(crate::core::EmulatorError::InvalidCommandBuffer(format!(
            "length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
