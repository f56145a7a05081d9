pub mod capture;
pub mod decode;
pub mod format;
pub mod opus_sink;
pub mod sink;
pub mod wav_sink;

pub use capture::{ActiveCapture, AudioCapture};
pub use format::{AudioFormat, Encoding};
pub use opus_sink::OpusSink;
pub use sink::AudioSink;
pub use wav_sink::WavSink;

use anyhow::Result;
use std::path::Path;

/// Create the sink for the format's encoding, truncating `path`
pub fn open_sink(path: &Path, format: AudioFormat) -> Result<Box<dyn AudioSink>> {
    Ok(match format.encoding {
        Encoding::Opus => Box::new(OpusSink::new(path, format)?),
        Encoding::Wav => Box::new(WavSink::new(path, format)?),
    })
}
