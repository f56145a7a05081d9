use anyhow::Result;
use async_trait::async_trait;

/// Trait for streaming audio encoding
///
/// Implementations write samples to the recording slot as they arrive rather
/// than buffering the whole take in memory.
#[async_trait]
pub trait AudioSink: Send {
    /// Write audio samples (streaming, called repeatedly during recording)
    /// The Vec is moved to avoid copying
    fn write_chunk(&mut self, samples: Vec<f32>) -> Result<()>;

    /// Flush everything written so far and close the file
    async fn finalize(&mut self) -> Result<()>;
}
