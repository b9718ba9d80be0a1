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

//! Video-out driver
//!
//! The driver accepts flips from any thread, queues them and presents them
//! from a dedicated presentation thread paced to the configured frame rate.
//!
//! # Flip path
//!
//! ```text
//! submit_flip ──(non-EOP)──> GPU thread ──┐
//!      │                                 ├──> submit_flip_internal ──> request queue
//!      └─────(EOP, same thread)──────────┘                                  │
//!                                                                           v
//!                          presentation thread: vblank tick ──> flip ──> Presenter::present
//! ```
//!
//! Requests leave the queue in the order they entered it. A non-EOP flip only
//! enters the queue once the GPU thread runs it, so an EOP flip submitted
//! concurrently may overtake it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::buffer::BufferAttribute;
use super::event::{event_id, flip_event_data, vblank_event_data, EventFilter, EventSink};
use super::port::{FlipStatus, ResolutionStatus, VblankStatus, VideoOutPort};
use super::presenter::Presenter;
use crate::core::amdgpu::{GpuExecutor, VAddr};
use crate::core::config::VideoOutConfig;
use crate::core::error::{EmulatorError, Result, VideoOutError};
use crate::core::timing::{FrameTimer, HostClock};

/// Handle of the main output port
pub const MAIN_PORT_HANDLE: i32 = 1;

/// Bus type of the main output
pub const BUS_TYPE_MAIN: i32 = 0;

/// Lower bound of the presentation interval
pub const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Presentation interval for `config`
///
/// The FPS limit wins when it is enabled and positive, then the vblank
/// frequency; a degenerate configuration clamps to [`MIN_FRAME_INTERVAL`].
///
/// # Example
///
/// ```
/// use orbisrx::core::config::VideoOutConfig;
/// use orbisrx::core::videoout::frame_interval;
/// use std::time::Duration;
///
/// let config = VideoOutConfig {
///     fps_limit_enabled: true,
///     fps_limit: 30,
///     ..VideoOutConfig::default()
/// };
/// assert_eq!(frame_interval(&config), Duration::from_nanos(33_333_333));
/// ```
pub fn frame_interval(config: &VideoOutConfig) -> Duration {
    let rate = if config.fps_limit_enabled && config.fps_limit > 0 {
        config.fps_limit
    } else {
        config.vblank_frequency
    };
    if rate == 0 {
        return MIN_FRAME_INTERVAL;
    }
    Duration::from_nanos(NANOS_PER_SECOND / rate as u64).max(MIN_FRAME_INTERVAL)
}

/// Collaborators injected into the driver
pub struct VideoOutContext<P: Presenter> {
    pub presenter: Arc<P>,
    /// Execution context of the GPU command processor
    pub gpu: Arc<dyn GpuExecutor>,
    pub config: VideoOutConfig,
    /// Set while the guest is paused by the debugger
    pub guest_paused: Arc<AtomicBool>,
    pub width: u32,
    pub height: u32,
}

impl<P: Presenter> VideoOutContext<P> {
    /// Context for a 1920x1080 output with default configuration
    pub fn new(presenter: Arc<P>, gpu: Arc<dyn GpuExecutor>) -> Self {
        Self {
            presenter,
            gpu,
            config: VideoOutConfig::default(),
            guest_paused: Arc::new(AtomicBool::new(false)),
            width: 1920,
            height: 1080,
        }
    }
}

/// Pending flip
struct Request<F> {
    frame: F,
    flip_arg: i64,
    /// Buffer slot, -1 for a blank frame
    index: i32,
    eop: bool,
}

/// State guarded by the driver mutex
struct DriverState<F> {
    requests: VecDeque<Request<F>>,
}

struct Shared<P: Presenter> {
    presenter: Arc<P>,
    gpu: Arc<dyn GpuExecutor>,
    config: VideoOutConfig,
    guest_paused: Arc<AtomicBool>,
    clock: HostClock,
    port: VideoOutPort,
    state: Mutex<DriverState<P::Frame>>,
    stop: AtomicBool,
}

impl<P: Presenter> Shared<P> {
    fn lock(&self) -> MutexGuard<'_, DriverState<P::Frame>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn submit_flip_internal(&self, index: i32, flip_arg: i64, eop: bool) {
        let frame = if index == -1 {
            self.presenter.prepare_blank_frame(false)
        } else {
            let target = {
                let state = self.port.lock_state();
                let buffer = state.buffers[index as usize];
                usize::try_from(buffer.group_index)
                    .ok()
                    .map(|group| (state.groups[group], buffer.address_left))
            };
            match target {
                Some((group, address)) => self.presenter.prepare_frame(&group, address),
                None => {
                    log::warn!(
                        "VideoOut: buffer {} was unregistered before its flip ran, presenting blank",
                        index
                    );
                    self.presenter.prepare_blank_frame(false)
                }
            }
        };

        self.lock().requests.push_back(Request {
            frame,
            flip_arg,
            index,
            eop,
        });
    }

    fn receive_request(&self) -> Option<Request<P::Frame>> {
        self.lock().requests.pop_front()
    }

    fn flip(&self, request: Request<P::Frame>) {
        let Request {
            frame,
            flip_arg,
            index,
            eop,
        } = request;

        let is_hdr = self.port.lock_state().is_hdr;
        self.presenter.set_hdr(is_hdr);
        self.presenter.present(frame, false);

        let (prev_index, sinks) = {
            let mut state = self.port.lock_state();
            let status = &mut state.flip_status;
            status.count += 1;
            status.process_time = self.clock.process_time();
            status.tsc = self.clock.read_tsc();
            status.flip_arg = flip_arg;
            status.current_buffer = index;
            if eop {
                status.gc_queue_num -= 1;
            }
            status.flip_pending_num -= 1;

            let sinks: Vec<Arc<dyn EventSink>> = state.flip_events.clone();
            (std::mem::replace(&mut state.prev_index, index), sinks)
        };

        for sink in sinks {
            sink.trigger_event(event_id::FLIP, EventFilter::VideoOut, flip_event_data(flip_arg));
        }
        if let Ok(prev) = usize::try_from(prev_index) {
            let _ = self.port.set_buffer_label(prev, 0);
        }
        log::trace!("VideoOut: flipped buffer {} (arg {})", index, flip_arg);
    }

    fn draw_blank_frame(&self) {
        let frame = self.presenter.prepare_blank_frame(false);
        self.presenter.present(frame, false);
    }

    fn draw_last_frame(&self) {
        let frame = self.presenter.prepare_last_frame();
        self.presenter.present(frame, true);
    }

    /// One vblank of the presentation loop
    fn vblank_tick(&self, has_budget: impl Fn() -> bool) {
        if self.guest_paused.load(Ordering::Acquire) {
            self.draw_last_frame();
            return;
        }

        let divisor = self.port.lock_state().flip_rate as u64 + 1;
        let count = self.port.lock_vblank().count;

        if count % divisor == 0 {
            match self.receive_request() {
                Some(request) => self.flip(request),
                None if has_budget() => {
                    if !self.port.is_open() {
                        self.draw_blank_frame();
                    } else if self.presenter.must_keep_drawing() {
                        self.draw_last_frame();
                    }
                }
                None => {}
            }
        }

        let count = {
            let mut vblank = self.port.lock_vblank();
            vblank.count += 1;
            if vblank.count % divisor == 0 {
                vblank.process_time = self.clock.process_time();
                vblank.tsc = self.clock.read_tsc();
            }
            self.port.notify_vblank();
            vblank.count
        };

        let sinks: Vec<Arc<dyn EventSink>> = self.port.lock_state().vblank_events.clone();
        for sink in sinks {
            sink.trigger_event(
                event_id::VBLANK,
                EventFilter::VideoOut,
                vblank_event_data(count),
            );
        }
    }
}

fn present_thread<P: Presenter>(shared: Arc<Shared<P>>) {
    let interval = frame_interval(&shared.config);
    log::info!(
        "VideoOut: presentation thread started, interval {} ns",
        interval.as_nanos()
    );

    let mut timer = FrameTimer::new(interval);
    while !shared.stop.load(Ordering::Acquire) {
        timer.start();
        shared.vblank_tick(|| timer.has_budget_remaining());
        timer.end();
    }
    log::info!("VideoOut: presentation thread stopped");
}

/// Video-out driver owning the main port and its presentation thread
///
/// # Example
///
/// ```
/// use orbisrx::core::amdgpu::InlineExecutor;
/// use orbisrx::core::videoout::buffer::{pixel_format, BufferAttribute, TilingMode};
/// use orbisrx::core::videoout::{NullPresenter, VideoOutContext, VideoOutDriver, BUS_TYPE_MAIN};
/// use std::sync::Arc;
///
/// let ctx = VideoOutContext::new(Arc::new(NullPresenter::new()), Arc::new(InlineExecutor));
/// let driver = VideoOutDriver::new_unstarted(ctx);
///
/// let handle = driver.open(BUS_TYPE_MAIN, 0).unwrap();
/// let attr = BufferAttribute::new(pixel_format::A8R8G8B8_SRGB, TilingMode::Tile, 1920, 1080);
/// driver.register_buffers(handle, 0, &[0x1000_0000, 0x1080_0000], &attr).unwrap();
///
/// assert!(driver.submit_flip(handle, 0, 7, false));
/// driver.run_vblank();
/// assert_eq!(driver.flip_status(handle).unwrap().flip_arg, 7);
/// ```
pub struct VideoOutDriver<P: Presenter> {
    shared: Arc<Shared<P>>,
    present_thread: Option<JoinHandle<()>>,
}

impl<P: Presenter> VideoOutDriver<P> {
    /// Create the driver and start its presentation thread
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::ThreadSpawn`] if the thread cannot be created.
    pub fn new(ctx: VideoOutContext<P>) -> Result<Self> {
        let mut driver = Self::new_unstarted(ctx);
        let shared = driver.shared.clone();
        let handle = thread::Builder::new()
            .name("VideoOut:Present".to_string())
            .spawn(move || present_thread(shared))
            .map_err(|e| EmulatorError::ThreadSpawn(e.to_string()))?;
        driver.present_thread = Some(handle);
        Ok(driver)
    }

    /// Create the driver without a presentation thread
    ///
    /// Vblanks only happen when [`run_vblank`](Self::run_vblank) is called.
    pub fn new_unstarted(ctx: VideoOutContext<P>) -> Self {
        let resolution = ResolutionStatus::new(ctx.width, ctx.height, ctx.config.vblank_frequency);
        Self {
            shared: Arc::new(Shared {
                presenter: ctx.presenter,
                gpu: ctx.gpu,
                config: ctx.config,
                guest_paused: ctx.guest_paused,
                clock: HostClock::new(),
                port: VideoOutPort::new(resolution),
                state: Mutex::new(DriverState {
                    requests: VecDeque::new(),
                }),
                stop: AtomicBool::new(false),
            }),
            present_thread: None,
        }
    }

    /// Run one presentation iteration on the calling thread, without pacing
    pub fn run_vblank(&self) {
        self.shared.vblank_tick(|| true);
    }

    /// Look up the port behind `handle`
    pub fn port(&self, handle: i32) -> std::result::Result<&VideoOutPort, VideoOutError> {
        if handle == MAIN_PORT_HANDLE {
            Ok(&self.shared.port)
        } else {
            Err(VideoOutError::InvalidHandle)
        }
    }

    /// Open the main output
    ///
    /// # Errors
    ///
    /// - `InvalidValue` for any bus other than the main bus, or a non-zero index
    /// - `ResourceBusy` if the port is already open
    pub fn open(&self, bus_type: i32, index: i32) -> std::result::Result<i32, VideoOutError> {
        if bus_type != BUS_TYPE_MAIN || index != 0 {
            log::error!("VideoOut: unsupported bus {} index {}", bus_type, index);
            return Err(VideoOutError::InvalidValue);
        }
        let _guard = self.shared.lock();
        let port = &self.shared.port;
        if port.is_open() {
            return Err(VideoOutError::ResourceBusy);
        }
        port.set_open(true);
        log::info!("VideoOut: opened main port");
        Ok(MAIN_PORT_HANDLE)
    }

    /// Close a port
    ///
    /// All flip event sinks must have been deleted beforehand.
    pub fn close(&self, handle: i32) -> std::result::Result<(), VideoOutError> {
        let port = self.port(handle)?;
        let _guard = self.shared.lock();
        if !port.is_open() {
            return Err(VideoOutError::InvalidHandle);
        }
        port.set_open(false);
        port.reset_on_close();
        log::info!("VideoOut: closed main port");
        Ok(())
    }

    /// Register `addresses.len()` buffers starting at `start_index`
    ///
    /// Returns the attribute group index, used later to unregister them.
    pub fn register_buffers(
        &self,
        handle: i32,
        start_index: usize,
        addresses: &[VAddr],
        attribute: &BufferAttribute,
    ) -> std::result::Result<i32, VideoOutError> {
        let port = self.port(handle)?;
        let registration = port.register_buffers(start_index, addresses, attribute)?;
        for &address in &registration.addresses {
            self.shared
                .presenter
                .register_video_out_surface(&registration.group, address);
        }
        Ok(registration.group_index)
    }

    /// Release an attribute group and every buffer in it
    pub fn unregister_buffers(
        &self,
        handle: i32,
        group_index: i32,
    ) -> std::result::Result<(), VideoOutError> {
        self.port(handle)?.unregister_buffers(group_index)
    }

    /// Queue a flip of buffer `index` (-1 for a blank frame)
    ///
    /// Returns `false` when the flip was dropped: the handle or index is
    /// invalid, or as many flips are pending as there are registered buffers.
    /// A dropped flip is not retried.
    pub fn submit_flip(&self, handle: i32, index: i32, flip_arg: i64, is_eop: bool) -> bool {
        let Ok(port) = self.port(handle) else {
            log::error!("VideoOut: flip on invalid handle {}", handle);
            return false;
        };

        {
            let mut state = port.lock_state();
            if index != -1 {
                let registered = usize::try_from(index)
                    .ok()
                    .and_then(|i| state.buffers.get(i))
                    .is_some_and(|buffer| buffer.is_registered());
                if !registered {
                    log::error!("VideoOut: flip of unregistered buffer {}", index);
                    return false;
                }
                let pending = state.flip_status.flip_pending_num.max(0) as usize;
                if pending >= state.num_registered_buffers() {
                    log::error!(
                        "VideoOut: flip queue full ({} pending), dropping flip {}",
                        pending,
                        flip_arg
                    );
                    return false;
                }
            }

            if is_eop {
                state.flip_status.gc_queue_num += 1;
            }
            state.flip_status.flip_pending_num += 1;
            state.flip_status.submit_tsc = self.shared.clock.read_tsc();
        }

        if is_eop {
            self.shared.submit_flip_internal(index, flip_arg, true);
        } else {
            let shared = self.shared.clone();
            self.shared.gpu.send_command(Box::new(move || {
                shared.submit_flip_internal(index, flip_arg, false);
            }));
        }
        true
    }

    /// Flip every `rate + 1` vblanks (rate 0, 1 or 2)
    pub fn set_flip_rate(&self, handle: i32, rate: i32) -> std::result::Result<(), VideoOutError> {
        let port = self.port(handle)?;
        let rate = u32::try_from(rate)
            .ok()
            .filter(|&r| r <= 2)
            .ok_or(VideoOutError::InvalidValue)?;
        port.lock_state().flip_rate = rate;
        log::debug!("VideoOut: flip rate {}", rate);
        Ok(())
    }

    /// Enable HDR output, if the configuration allows it
    pub fn set_hdr(&self, handle: i32, enable: bool) -> std::result::Result<(), VideoOutError> {
        let port = self.port(handle)?;
        let hdr = enable && self.shared.config.allow_hdr;
        if enable && !hdr {
            log::warn!("VideoOut: HDR requested but disabled in config");
        }
        port.lock_state().is_hdr = hdr;
        Ok(())
    }

    pub fn add_flip_event(
        &self,
        handle: i32,
        sink: Arc<dyn EventSink>,
    ) -> std::result::Result<(), VideoOutError> {
        self.port(handle)?.add_flip_event(sink);
        Ok(())
    }

    pub fn delete_flip_event(
        &self,
        handle: i32,
        sink: &Arc<dyn EventSink>,
    ) -> std::result::Result<(), VideoOutError> {
        self.port(handle)?.delete_flip_event(sink)
    }

    pub fn add_vblank_event(
        &self,
        handle: i32,
        sink: Arc<dyn EventSink>,
    ) -> std::result::Result<(), VideoOutError> {
        self.port(handle)?.add_vblank_event(sink);
        Ok(())
    }

    pub fn delete_vblank_event(
        &self,
        handle: i32,
        sink: &Arc<dyn EventSink>,
    ) -> std::result::Result<(), VideoOutError> {
        self.port(handle)?.delete_vblank_event(sink)
    }

    pub fn flip_status(&self, handle: i32) -> std::result::Result<FlipStatus, VideoOutError> {
        Ok(self.port(handle)?.flip_status())
    }

    pub fn vblank_status(&self, handle: i32) -> std::result::Result<VblankStatus, VideoOutError> {
        Ok(self.port(handle)?.vblank_status())
    }

    pub fn resolution_status(
        &self,
        handle: i32,
    ) -> std::result::Result<ResolutionStatus, VideoOutError> {
        Ok(self.port(handle)?.resolution())
    }

    /// Number of flips submitted but not yet presented
    pub fn is_flip_pending(&self, handle: i32) -> std::result::Result<i32, VideoOutError> {
        Ok(self.port(handle)?.flip_status().flip_pending_num)
    }

    /// Block until the next vblank or `timeout`
    pub fn wait_vblank(
        &self,
        handle: i32,
        timeout: Duration,
    ) -> std::result::Result<bool, VideoOutError> {
        Ok(self.port(handle)?.wait_vblank(timeout))
    }

    /// Number of requests waiting for the presentation thread
    pub fn queued_requests(&self) -> usize {
        self.shared.lock().requests.len()
    }
}

impl<P: Presenter> Drop for VideoOutDriver<P> {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(handle) = self.present_thread.take() {
            if handle.join().is_err() {
                log::error!("VideoOut: presentation thread panicked");
            }
        }
    }
}
