use crate::audio::{AudioFormat, Encoding};
use crate::services::MicrophoneAccess;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// The single slot every recording is written to. Defaults to
    /// `voice-memo.<ext>` in the temp directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_path: Option<PathBuf>,

    #[serde(default)]
    pub encoding: Encoding,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Bits per second for compressed encodings
    #[serde(default = "default_bit_rate")]
    pub bit_rate: u32,

    #[serde(default)]
    pub microphone_access: MicrophoneAccess,
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_channels() -> u16 {
    1
}

fn default_bit_rate() -> u32 {
    48000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recording_path: None,
            encoding: Encoding::default(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            bit_rate: default_bit_rate(),
            microphone_access: MicrophoneAccess::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.config/voice-memo/config.json)
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        tracing::info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(dir)
        } else {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join("voice-memo").join("config.json"))
    }

    pub fn recording_path(&self) -> PathBuf {
        self.recording_path.clone().unwrap_or_else(|| {
            std::env::temp_dir().join(format!("voice-memo.{}", self.encoding.extension()))
        })
    }

    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            encoding: self.encoding,
            sample_rate: self.sample_rate,
            channels: self.channels,
            bit_rate: self.bit_rate,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let recording_path = self.recording_path();
        if recording_path.file_name().is_none() {
            return Err(anyhow::anyhow!(
                "recording_path must name a file: {:?}",
                recording_path
            ));
        }

        if !(8000..=192_000).contains(&self.sample_rate) {
            return Err(anyhow::anyhow!(
                "sample_rate must be between 8000 and 192000, got {}",
                self.sample_rate
            ));
        }

        if !(1..=2).contains(&self.channels) {
            return Err(anyhow::anyhow!(
                "channels must be 1 or 2, got {}",
                self.channels
            ));
        }

        if self.encoding == Encoding::Opus {
            if !AudioFormat::OPUS_SAMPLE_RATES.contains(&self.sample_rate) {
                return Err(anyhow::anyhow!(
                    "opus encoding needs a sample_rate of {:?}, got {}",
                    AudioFormat::OPUS_SAMPLE_RATES,
                    self.sample_rate
                ));
            }

            if !(6000..=510_000).contains(&self.bit_rate) {
                return Err(anyhow::anyhow!(
                    "bit_rate must be between 6000 and 510000, got {}",
                    self.bit_rate
                ));
            }
        }

        Ok(())
    }
}
