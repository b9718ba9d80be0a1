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

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use log::{error, info};
use orbisrx::core::amdgpu::{words_from_bytes, Fence, FenceDetector, GpuCommandQueue, PacketWalker};
use orbisrx::core::error::Result;
use orbisrx::core::videoout::buffer::{pixel_format, BufferAttribute, TilingMode};
use orbisrx::core::videoout::{
    EventQueue, EventSink, NullPresenter, VideoOutContext, VideoOutDriver, BUS_TYPE_MAIN,
};
use orbisrx::core::Config;
use serde::Serialize;

/// PlayStation 4 GPU command-buffer and video-out tool
#[derive(Parser)]
#[command(name = "orbisrx")]
#[command(about = "PS4 PM4 fence scanner and video-out driver", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the fences of a raw little-endian PM4 dump
    Fences {
        /// Path to the command-buffer dump
        dump: PathBuf,

        /// Print a JSON report instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run the video-out driver against a null presenter
    Present {
        /// Path to a TOML configuration file
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// How long to run
        #[arg(short = 's', long, default_value = "2")]
        seconds: u64,

        /// Number of display buffers to register
        #[arg(short = 'b', long, default_value = "2")]
        buffers: usize,
    },
}

#[derive(Serialize)]
struct FenceReport {
    words: usize,
    packets: usize,
    truncated: bool,
    fences: Vec<Fence>,
}

fn init_logger(default_filter: &str) {
    if let Err(e) = dotenvy::dotenv() {
        // Only report if the error is NOT "file not found"
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn run_fences(dump: PathBuf, json: bool) -> Result<()> {
    let bytes = std::fs::read(&dump)?;
    let words = words_from_bytes(&bytes)?;
    info!("Scanning {} ({} words)", dump.display(), words.len());

    let packets = PacketWalker::new(&words).count();
    let detector = FenceDetector::new(&words);
    let report = FenceReport {
        words: words.len(),
        packets,
        truncated: detector.is_truncated(),
        fences: detector.fences(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{:>8}  {:>18}  {:>18}", "offset", "address", "value");
    for fence in &report.fences {
        println!(
            "{:>8}  0x{:016X}  0x{:016X}",
            fence.offset, fence.address, fence.value
        );
    }
    println!(
        "{} fences in {} packets{}",
        report.fences.len(),
        report.packets,
        if report.truncated { " (truncated)" } else { "" }
    );
    Ok(())
}

fn run_present(config: Config, seconds: u64, buffers: usize) -> Result<()> {
    let gpu = Arc::new(GpuCommandQueue::new()?);
    let presenter = Arc::new(NullPresenter::new());
    let mut ctx = VideoOutContext::new(presenter.clone(), gpu.clone());
    ctx.config = config.gpu;
    let driver = VideoOutDriver::new(ctx)?;

    let handle = driver.open(BUS_TYPE_MAIN, 0)?;
    let addresses: Vec<u64> = (0..buffers as u64)
        .map(|i| 0x1_0000_0000 + i * 0x80_0000)
        .collect();
    let attr = BufferAttribute::new(pixel_format::A8R8G8B8_SRGB, TilingMode::Tile, 1920, 1080);
    let group = driver.register_buffers(handle, 0, &addresses, &attr)?;

    let flips = EventQueue::new("flip");
    let sink: Arc<dyn EventSink> = flips.clone();
    driver.add_flip_event(handle, sink.clone())?;

    let deadline = Instant::now() + Duration::from_secs(seconds);
    let (submitted, dropped) = thread::scope(|s| {
        let producer = s.spawn(|| {
            let mut submitted = 0u64;
            let mut dropped = 0u64;
            while Instant::now() < deadline {
                let index = match buffers {
                    0 => -1,
                    n => (submitted % n as u64) as i32,
                };
                if driver.submit_flip(handle, index, submitted as i64, false) {
                    submitted += 1;
                } else {
                    dropped += 1;
                }
                let _ = driver.wait_vblank(handle, Duration::from_millis(100));
            }
            (submitted, dropped)
        });
        producer.join().unwrap_or_else(|_| {
            error!("Flip producer panicked");
            (0, 0)
        })
    });

    gpu.flush();
    let status = driver.flip_status(handle)?;
    let vblank = driver.vblank_status(handle)?;
    info!(
        "Flips: {} submitted, {} dropped, {} presented, {} events",
        submitted,
        dropped,
        status.count,
        flips.len()
    );
    info!(
        "Vblanks: {} | frames presented: {} | redraws: {}",
        vblank.count,
        presenter.presented(),
        presenter.redrawn()
    );

    driver.delete_flip_event(handle, &sink)?;
    driver.unregister_buffers(handle, group)?;
    driver.close(handle)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Fences { dump, json } => {
            init_logger("info");
            info!("orbisrx v{}", env!("CARGO_PKG_VERSION"));
            run_fences(dump, json).inspect_err(|e| error!("Fence scan failed: {}", e))
        }
        Command::Present {
            config,
            seconds,
            buffers,
        } => {
            let config = match config {
                Some(path) => Config::load(path)?,
                None => Config::default(),
            };
            init_logger(&config.general.log_filter);
            info!("orbisrx v{}", env!("CARGO_PKG_VERSION"));
            run_present(config, seconds, buffers)
                .inspect_err(|e| error!("Presentation failed: {}", e))
        }
    }
}
