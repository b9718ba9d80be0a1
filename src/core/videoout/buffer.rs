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

//! Display buffer type definitions
//!
//! This module contains the buffer slot, attribute group and attribute types
//! that guests register with a video-out port.

use crate::core::amdgpu::VAddr;
use crate::core::error::VideoOutError;

/// Maximum registered display buffers per port
pub const MAX_DISPLAY_BUFFERS: usize = 16;

/// Maximum buffer attribute groups per port
pub const MAX_DISPLAY_BUFFER_GROUPS: usize = 4;

/// Pixel format encodings
pub mod pixel_format {
    pub const A8R8G8B8_SRGB: u32 = 0x8000_0000;
    pub const A8B8G8R8_SRGB: u32 = 0x8000_2200;
    pub const A2R10G10B10: u32 = 0x8806_0000;
    pub const A2R10G10B10_SRGB: u32 = 0x8800_0000;
    pub const A2R10G10B10_BT2020_PQ: u32 = 0x8874_0000;
}

/// Surface tiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilingMode {
    Tile,
    Linear,
}

impl TilingMode {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(TilingMode::Tile),
            1 => Some(TilingMode::Linear),
            _ => None,
        }
    }
}

/// Geometry and format shared by every buffer of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferAttribute {
    pub pixel_format: u32,
    pub tiling_mode: u32,
    pub aspect_ratio: u32,
    pub width: u32,
    pub height: u32,
    pub pitch_in_pixel: u32,
    pub option: u32,
    pub reserved0: u32,
    pub reserved1: u64,
}

impl BufferAttribute {
    /// Attribute for a linear or tiled surface with `pitch == width`
    pub fn new(pixel_format: u32, tiling_mode: TilingMode, width: u32, height: u32) -> Self {
        Self {
            pixel_format,
            tiling_mode: match tiling_mode {
                TilingMode::Tile => 0,
                TilingMode::Linear => 1,
            },
            aspect_ratio: 0,
            width,
            height,
            pitch_in_pixel: width,
            option: 0,
            reserved0: 0,
            reserved1: 0,
        }
    }

    /// Check the attribute fields before registration
    ///
    /// # Errors
    ///
    /// - `InvalidValue` if a reserved field is non-zero
    /// - `InvalidAspectRatio` if the aspect ratio is not 0 (16:9)
    /// - `InvalidPitch` if the width exceeds the pitch
    /// - `InvalidTilingMode` if the tiling mode is neither tiled nor linear
    pub fn validate(&self) -> Result<TilingMode, VideoOutError> {
        if self.reserved0 != 0 || self.reserved1 != 0 {
            log::error!("VideoOut: reserved attribute fields must be zero");
            return Err(VideoOutError::InvalidValue);
        }
        if self.aspect_ratio != 0 {
            log::error!("VideoOut: invalid aspect ratio {}", self.aspect_ratio);
            return Err(VideoOutError::InvalidAspectRatio);
        }
        if self.width > self.pitch_in_pixel {
            log::error!(
                "VideoOut: width {} exceeds pitch {}",
                self.width,
                self.pitch_in_pixel
            );
            return Err(VideoOutError::InvalidPitch);
        }
        TilingMode::from_raw(self.tiling_mode).ok_or_else(|| {
            log::error!("VideoOut: invalid tiling mode {}", self.tiling_mode);
            VideoOutError::InvalidTilingMode
        })
    }
}

/// One display buffer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoOutBuffer {
    /// Owning attribute group, -1 when unregistered
    pub group_index: i32,
    pub address_left: VAddr,
    pub address_right: VAddr,
}

impl VideoOutBuffer {
    pub const UNREGISTERED: Self = Self {
        group_index: -1,
        address_left: 0,
        address_right: 0,
    };

    pub fn is_registered(&self) -> bool {
        self.group_index >= 0
    }
}

impl Default for VideoOutBuffer {
    fn default() -> Self {
        Self::UNREGISTERED
    }
}

/// Attribute group slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferAttributeGroup {
    pub is_occupied: bool,
    pub attrib: BufferAttribute,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attribute() -> BufferAttribute {
        BufferAttribute::new(pixel_format::A8R8G8B8_SRGB, TilingMode::Tile, 1920, 1080)
    }

    #[test]
    fn test_valid_attribute() {
        assert_eq!(attribute().validate(), Ok(TilingMode::Tile));
    }

    #[test]
    fn test_reserved_fields() {
        let attr = BufferAttribute {
            reserved1: 1,
            ..attribute()
        };
        assert_eq!(attr.validate(), Err(VideoOutError::InvalidValue));
    }

    #[test]
    fn test_aspect_ratio() {
        let attr = BufferAttribute {
            aspect_ratio: 1,
            ..attribute()
        };
        assert_eq!(attr.validate(), Err(VideoOutError::InvalidAspectRatio));
    }

    #[test]
    fn test_pitch_smaller_than_width() {
        let attr = BufferAttribute {
            pitch_in_pixel: 1280,
            ..attribute()
        };
        assert_eq!(attr.validate(), Err(VideoOutError::InvalidPitch));
    }

    #[test]
    fn test_wider_pitch_is_allowed() {
        let attr = BufferAttribute {
            pitch_in_pixel: 2048,
            ..attribute()
        };
        assert!(attr.validate().is_ok());
    }

    #[test]
    fn test_tiling_mode() {
        let attr = BufferAttribute {
            tiling_mode: 2,
            ..attribute()
        };
        assert_eq!(attr.validate(), Err(VideoOutError::InvalidTilingMode));
    }

    #[test]
    fn test_unregistered_slot() {
        assert!(!VideoOutBuffer::default().is_registered());
    }
}
