// Capture always delivers interleaved f32 samples. The encoding decides what
// the sink turns them into on disk.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Opus packets in an Ogg container, compressed to `bit_rate`
    #[default]
    Opus,
    /// 16-bit signed integer PCM
    Wav,
}

impl Encoding {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Opus => "opus",
            Self::Wav => "wav",
        }
    }
}

/// The fixed recorder configuration handed to the capture service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub encoding: Encoding,
    pub sample_rate: u32,
    pub channels: u16,
    /// Encoder bit rate in bits per second; PCM ignores it
    pub bit_rate: u32,
}

impl AudioFormat {
    pub const BITS_PER_SAMPLE: u16 = 16;

    /// Rates the Opus encoder accepts
    pub const OPUS_SAMPLE_RATES: [u32; 5] = [8000, 12000, 16000, 24000, 48000];

    /// Calculate number of interleaved samples for a given duration in seconds
    pub fn samples_for_duration(&self, seconds: f32) -> usize {
        (self.sample_rate as f32 * self.channels as f32 * seconds) as usize
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            encoding: Encoding::Opus,
            sample_rate: 48000,
            channels: 1,
            bit_rate: 48000,
        }
    }
}
