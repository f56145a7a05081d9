use super::PlaybackService;
use crate::audio::decode;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

/// Plays recordings on the default output device
///
/// Only one playback runs at a time; starting a new one stops the previous.
#[derive(Default)]
pub struct RodioPlayer {
    current: Option<Playback>,
}

struct Playback {
    cancelled: Arc<AtomicBool>,
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl RodioPlayer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlaybackService for RodioPlayer {
    async fn play(&mut self, path: &Path) -> Result<()> {
        self.current = None;

        let path = path.to_path_buf();
        let cancelled = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = oneshot::channel();

        let flag = cancelled.clone();
        tokio::task::spawn_blocking(move || play_blocking(path, flag, started_tx));

        started_rx
            .await
            .context("Playback thread exited before starting")??;

        self.current = Some(Playback { cancelled });
        Ok(())
    }
}

fn play_blocking(path: PathBuf, cancelled: Arc<AtomicBool>, started: oneshot::Sender<Result<()>>) {
    let (stream, sink) = match start(&path) {
        Ok(playing) => {
            let _ = started.send(Ok(()));
            playing
        }
        Err(e) => {
            let _ = started.send(Err(e));
            return;
        }
    };

    tracing::info!("Playing {}", path.display());
    while !sink.empty() && !cancelled.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(50));
    }
    sink.stop();
    drop(stream);
    tracing::debug!("Playback of {} finished", path.display());
}

fn open_output() -> Result<OutputStream> {
    let mut stream =
        OutputStreamBuilder::open_default_stream().context("Failed to open audio output")?;
    // Dropping the stream at the end of every playback is expected
    stream.log_on_drop(false);
    Ok(stream)
}

/// Decode or open the file first, so a bad file fails before touching the device
fn start(path: &Path) -> Result<(OutputStream, Sink)> {
    if decode::is_ogg(path)? {
        let audio = decode::decode_file(path)
            .with_context(|| format!("Failed to decode {}", path.display()))?;
        let stream = open_output()?;
        let sink = Sink::connect_new(stream.mixer());
        sink.append(SamplesBuffer::new(
            audio.channels,
            audio.sample_rate,
            audio.samples,
        ));
        return Ok((stream, sink));
    }

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let stream = open_output()?;
    let sink = rodio::play(stream.mixer(), BufReader::new(file))
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    Ok((stream, sink))
}
