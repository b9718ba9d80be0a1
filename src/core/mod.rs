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

//! Core emulation components
//!
//! This module contains:
//! - AMD GPU (Liverpool) command-buffer decoding and fence detection
//! - Video-out ports, flip queue and presentation thread
//! - Host timing utilities
//! - Configuration and error types

pub mod amdgpu;
pub mod config;
pub mod error;
pub mod timing;
pub mod videoout;

// Re-export commonly used types
pub use amdgpu::{FenceDetector, GpuCommandQueue, GpuExecutor, PacketWalker};
pub use config::Config;
pub use error::{EmulatorError, Result, VideoOutError};
pub use videoout::{Presenter, VideoOutDriver};
