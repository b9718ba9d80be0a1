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

//! Video-out (display output) emulation
//!
//! Guests register display buffers with a port, then submit flips naming one
//! of them. Flips are queued and presented by a paced presentation thread
//! that also drives the vblank counter.
//!
//! # Module Organization
//!
//! - [`buffer`]: buffer slots, attribute groups and attribute validation
//! - [`event`]: flip/vblank event sinks and their correlation data
//! - [`port`]: per-port state, status blocks and flip labels
//! - [`presenter`]: the rendering back end interface
//! - `driver`: flip submission and the presentation loop

pub mod buffer;
mod driver;
pub mod event;
pub mod port;
pub mod presenter;

#[cfg(test)]
mod tests;

pub use buffer::{BufferAttribute, BufferAttributeGroup, TilingMode, VideoOutBuffer};
pub use driver::{
    frame_interval, VideoOutContext, VideoOutDriver, BUS_TYPE_MAIN, MAIN_PORT_HANDLE,
    MIN_FRAME_INTERVAL,
};
pub use event::{EventFilter, EventQueue, EventSink, TriggeredEvent};
pub use port::{FlipStatus, ResolutionStatus, VblankStatus, VideoOutPort};
pub use presenter::{NullFrame, NullPresenter, Presenter};
