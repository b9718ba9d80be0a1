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

//! PlayStation 4 emulator core library
//!
//! This library provides two pieces of the PS4 graphics stack:
//! the PM4 command-buffer fence detector used by the GPU command processor,
//! and the video-out driver that paces and presents guest flips.
//!
//! # Example
//!
//! ```
//! use orbisrx::core::amdgpu::FenceDetector;
//!
//! // A single type-2 filler packet contains no fences
//! let cmd = [0x8000_0000u32];
//! let detector = FenceDetector::new(&cmd);
//! assert!(!detector.is_fence(0));
//! ```

pub mod core;
