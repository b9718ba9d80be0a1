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

//! GPU command-processor execution context
//!
//! Work that must be serialized with the GPU command stream (for example a
//! flip requested from an arbitrary guest thread) is sent to the command
//! processor as a closure and runs there in submission order.

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use crate::core::error::{EmulatorError, Result};

/// Deferred unit of work for the GPU thread
pub type GpuCommand = Box<dyn FnOnce() + Send + 'static>;

/// Anything that can run commands on the GPU's execution context
pub trait GpuExecutor: Send + Sync {
    /// Queue `command` behind everything previously sent
    fn send_command(&self, command: GpuCommand);
}

/// Executor that runs every command on the caller's thread
///
/// Useful when the caller already is the GPU thread, and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl GpuExecutor for InlineExecutor {
    fn send_command(&self, command: GpuCommand) {
        command();
    }
}

/// Dedicated GPU command thread
///
/// Commands run one at a time, in the order they were sent. Dropping the
/// queue lets the worker drain what is already queued and joins it.
///
/// # Example
///
/// ```
/// use orbisrx::core::amdgpu::{GpuCommandQueue, GpuExecutor};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// let queue = GpuCommandQueue::new().unwrap();
/// let counter = Arc::new(AtomicU32::new(0));
/// for _ in 0..4 {
///     let counter = counter.clone();
///     queue.send_command(Box::new(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     }));
/// }
/// queue.flush();
/// assert_eq!(counter.load(Ordering::SeqCst), 4);
/// ```
pub struct GpuCommandQueue {
    sender: Option<Sender<GpuCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl GpuCommandQueue {
    /// Spawn the command thread
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::ThreadSpawn`] if the OS refuses to create the
    /// thread.
    pub fn new() -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<GpuCommand>();
        let worker = thread::Builder::new()
            .name("GPU:CommandQueue".to_string())
            .spawn(move || {
                log::debug!("GPU command queue started");
                for command in receiver {
                    command();
                }
                log::debug!("GPU command queue stopped");
            })
            .map_err(|e| EmulatorError::ThreadSpawn(e.to_string()))?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Block until every command sent so far has finished
    pub fn flush(&self) {
        let (done_tx, done_rx) = mpsc::channel();
        self.send_command(Box::new(move || {
            let _ = done_tx.send(());
        }));
        let _ = done_rx.recv();
    }
}

impl GpuExecutor for GpuCommandQueue {
    fn send_command(&self, command: GpuCommand) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(command).is_err() {
            log::error!("GPU command queue is gone, dropping command");
        }
    }
}

impl Drop for GpuCommandQueue {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once it is drained
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            // The last owner may be a command running on the worker itself
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                log::error!("GPU command thread panicked");
            }
        }
    }
}
