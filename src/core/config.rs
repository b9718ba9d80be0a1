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

//! Emulator configuration
//!
//! Configuration is stored as TOML. Every field has a default, so a partial
//! (or empty) file is valid.
//!
//! ```toml
//! [general]
//! log_filter = "info"
//!
//! [gpu]
//! fps_limit_enabled = false
//! fps_limit = 60
//! vblank_frequency = 60
//! allow_hdr = false
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::error::Result;

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub gpu: VideoOutConfig,
}

/// General settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// `env_logger` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
        }
    }
}

/// Settings read by the video-out presentation thread
///
/// The driver takes a snapshot of this at construction; later edits have no
/// effect on a running driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoOutConfig {
    /// Pace presentation to `fps_limit` instead of the vblank rate
    pub fps_limit_enabled: bool,

    /// Frames per second when the limiter is enabled
    pub fps_limit: u32,

    /// Emulated vblank rate in Hz
    pub vblank_frequency: u32,

    /// Whether guests may switch the output to HDR
    pub allow_hdr: bool,
}

impl Default for VideoOutConfig {
    fn default() -> Self {
        Self {
            fps_limit_enabled: false,
            fps_limit: 60,
            vblank_frequency: 60,
            allow_hdr: false,
        }
    }
}

impl Config {
    /// Parse configuration from a TOML string
    ///
    /// # Example
    ///
    /// ```
    /// use orbisrx::core::Config;
    ///
    /// let config = Config::from_toml_str("[gpu]\nfps_limit_enabled = true\nfps_limit = 30\n").unwrap();
    /// assert!(config.gpu.fps_limit_enabled);
    /// assert_eq!(config.gpu.fps_limit, 30);
    /// assert_eq!(config.gpu.vblank_frequency, 60);
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Config: loaded {}", path.as_ref().display());
        Ok(config)
    }

    /// Serialize configuration to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Write configuration to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path.as_ref(), self.to_toml_string()?)?;
        log::info!("Config: saved {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::EmulatorError;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.general.log_filter, "info");
    }

    #[test]
    fn test_partial_gpu_section() {
        let config = Config::from_toml_str("[gpu]\nvblank_frequency = 120\n").unwrap();
        assert_eq!(config.gpu.vblank_frequency, 120);
        assert!(!config.gpu.fps_limit_enabled);
        assert_eq!(config.gpu.fps_limit, 60);
    }

    #[test]
    fn test_parse_error() {
        let err = Config::from_toml_str("[gpu]\nfps_limit = \"fast\"\n").unwrap_err();
        assert!(matches!(err, EmulatorError::ConfigParse(_)));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.gpu.fps_limit_enabled = true;
        config.gpu.fps_limit = 144;
        config.general.log_filter = "orbisrx=debug".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, EmulatorError::Io(_)));
    }
}
