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

/// Emulator error types
use thiserror::Error;

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Main error type for the emulator
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Video out error: {0}")]
    VideoOut(#[from] VideoOutError),

    #[error("Invalid command buffer: {0}")]
    InvalidCommandBuffer(String),

    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(String),
}

/// Video-out error codes
///
/// Every variant corresponds to a guest-visible `ORBIS_VIDEO_OUT_ERROR_*`
/// value returned by [`VideoOutError::code`]. Callers in the HLE layer forward
/// that code to guest code unchanged, so variants must stay distinguishable.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoOutError {
    #[error("invalid value")]
    InvalidValue,

    #[error("invalid pitch")]
    InvalidPitch,

    #[error("invalid tiling mode")]
    InvalidTilingMode,

    #[error("invalid aspect ratio")]
    InvalidAspectRatio,

    #[error("resource busy")]
    ResourceBusy,

    #[error("invalid buffer index")]
    InvalidIndex,

    #[error("invalid port handle")]
    InvalidHandle,

    #[error("invalid event")]
    InvalidEvent,

    #[error("no empty buffer attribute slot")]
    NoEmptySlot,

    #[error("buffer slot occupied")]
    SlotOccupied,
}

impl VideoOutError {
    /// Guest-visible error code
    ///
    /// # Example
    ///
    /// ```
    /// use orbisrx::core::VideoOutError;
    ///
    /// assert_eq!(VideoOutError::InvalidPitch.code(), 0x8029_0004);
    /// ```
    pub fn code(self) -> u32 {
        match self {
            VideoOutError::InvalidValue => 0x8029_0001,
            VideoOutError::InvalidPitch => 0x8029_0004,
            VideoOutError::InvalidTilingMode => 0x8029_0007,
            VideoOutError::InvalidAspectRatio => 0x8029_0008,
            VideoOutError::ResourceBusy => 0x8029_0009,
            VideoOutError::InvalidIndex => 0x8029_000A,
            VideoOutError::InvalidHandle => 0x8029_000B,
            VideoOutError::InvalidEvent => 0x8029_000D,
            VideoOutError::NoEmptySlot => 0x8029_000F,
            VideoOutError::SlotOccupied => 0x8029_0010,
        }
    }
}
