//! Configuration loading
//!
//! Reads a TOML file first and falls back to a postcard-encoded blob.
//! Sections missing from the TOML take their defaults.

use std::fs;
use std::path::Path;

use hxspi_core::{BusConfig, DeviceConfig, DeviceInfo, PollConfig};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::display::DisplayNotifier;

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("config is neither TOML ({toml}) nor postcard ({postcard})")]
    Unrecognized {
        toml: String,
        postcard: postcard::Error,
    },
    #[error("failed to encode config: {0}")]
    Encode(postcard::Error),
    #[error("invalid configuration: {0}")]
    Invalid(hxspi_core::Error),
}

/// Everything a host harness needs to bring a device up
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub bus: BusConfig,
    pub info: DeviceInfo,
    pub poll: PollConfig,
    /// Display stack delivering blank events
    pub display: DisplayNotifier,
}

impl HostConfig {
    /// The part of the configuration the core consumes
    pub fn device(&self) -> DeviceConfig {
        DeviceConfig {
            bus: self.bus,
            info: self.info.clone(),
            poll: self.poll,
        }
    }
}

/// Load and validate a device configuration
pub fn load_config(path: impl AsRef<Path>) -> Result<DeviceConfig, ConfigError> {
    load_host_config(path).map(|config| config.device())
}

/// Load and validate a host configuration
pub fn load_host_config(path: impl AsRef<Path>) -> Result<HostConfig, ConfigError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    debug!("read {} bytes from {}", bytes.len(), path.display());

    let config = parse(&bytes)?;
    config.device().validate().map_err(ConfigError::Invalid)?;

    info!(
        "loaded config: {} transfer {} bytes, {} retries, display {:?}",
        config.info.chip_name.as_str(),
        config.bus.max_transfer_len,
        config.bus.retries,
        config.display
    );
    Ok(config)
}

/// Parse TOML, falling back to postcard
pub fn parse(bytes: &[u8]) -> Result<HostConfig, ConfigError> {
    let toml_error = match std::str::from_utf8(bytes) {
        Ok(text) => match toml::from_str::<HostConfig>(text) {
            Ok(config) => return Ok(config),
            Err(e) => {
                warn!("TOML parse failed, trying postcard: {}", e);
                e.to_string()
            }
        },
        Err(_) => {
            debug!("config is not UTF-8, trying postcard");
            String::from("not UTF-8")
        }
    };

    decode_postcard(bytes).map_err(|postcard| ConfigError::Unrecognized {
        toml: toml_error,
        postcard,
    })
}

/// Encode a configuration as a postcard blob
pub fn encode_postcard(config: &HostConfig) -> Result<Vec<u8>, ConfigError> {
    postcard::to_allocvec(config).map_err(ConfigError::Encode)
}

fn decode_postcard(bytes: &[u8]) -> Result<HostConfig, postcard::Error> {
    postcard::from_bytes(bytes)
}
