use super::CaptureService;
use crate::audio::{self, ActiveCapture, AudioCapture, AudioFormat, AudioSink};
use crate::error::RecorderError;
use crate::messages::RecorderCommand;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};

/// Coordinates audio capture and encoding
///
/// This service:
/// - Manages AudioCapture lifecycle
/// - Receives audio chunks via channel
/// - Streams chunks to the sink for the configured encoding
/// - Handles start/stop commands
///
/// Note: This service holds cpal::Stream which is !Send, so it must be spawned
/// on a LocalSet using tokio::task::spawn_local.
pub struct Recorder {
    cmd_rx: mpsc::Receiver<RecorderCommand>,
    audio_rx: Option<mpsc::Receiver<Vec<f32>>>,
    sink: Option<Box<dyn AudioSink>>,
    capture: Option<ActiveCapture>,
    recording: bool,
}

impl Recorder {
    pub fn new(cmd_rx: mpsc::Receiver<RecorderCommand>) -> Self {
        Self {
            cmd_rx,
            audio_rx: None,
            sink: None,
            capture: None,
            recording: false,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                // Handle commands from the controller
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },

                // Receive and process audio chunks (only when recording)
                Some(chunk) = next_chunk(&mut self.audio_rx), if self.recording => {
                    if let Some(sink) = self.sink.as_mut() {
                        // Stream chunk to sink (Vec is moved, no copy)
                        if let Err(e) = sink.write_chunk(chunk) {
                            tracing::error!("Failed to write audio chunk: {}", e);
                            self.recording = false;
                        }
                    }
                }
            }
        }

        tracing::debug!("Recorder command channel closed, exiting");
    }

    async fn handle_command(&mut self, cmd: RecorderCommand) {
        match cmd {
            RecorderCommand::Start {
                path,
                format,
                reply,
            } => {
                let result = self.start(path, format);
                if let Err(e) = &result {
                    tracing::error!("Failed to start recording: {:#}", e);
                }
                let _ = reply.send(result);
            }

            RecorderCommand::Stop(reply) => {
                let result = self.stop().await;
                let _ = reply.send(result);
            }
        }
    }

    fn start(&mut self, path: PathBuf, format: AudioFormat) -> Result<()> {
        if self.sink.is_some() {
            anyhow::bail!("A recording is already in progress");
        }

        let (audio_tx, audio_rx) = mpsc::channel(100);

        // Open the device before touching the slot so a failed start leaves
        // the previous recording intact
        let capture = AudioCapture::start(format, audio_tx)?;
        let sink = audio::open_sink(&path, format)?;

        self.audio_rx = Some(audio_rx);
        self.capture = Some(capture);
        self.sink = Some(sink);
        self.recording = true;

        tracing::info!("Recording started: {}", path.display());
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.recording = false;

        let mut sink = self.sink.take().context("No recording in progress")?;

        // Halting the stream makes the bridge flush the ring buffer and then
        // close the channel
        if let Some(capture) = self.capture.take() {
            capture.finish();
        }

        if let Some(mut audio_rx) = self.audio_rx.take() {
            while let Some(chunk) = audio_rx.recv().await {
                if let Err(e) = sink.write_chunk(chunk) {
                    tracing::error!("Failed to write audio chunk during drain: {}", e);
                    break;
                }
            }
        }

        sink.finalize().await?;

        tracing::info!("Recording stopped");
        Ok(())
    }
}

async fn next_chunk(audio_rx: &mut Option<mpsc::Receiver<Vec<f32>>>) -> Option<Vec<f32>> {
    match audio_rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Handle for communicating with the Recorder
pub struct RecorderHandle {
    tx: mpsc::Sender<RecorderCommand>,
    active: bool,
}

impl RecorderHandle {
    pub fn new(tx: mpsc::Sender<RecorderCommand>) -> Self {
        Self { tx, active: false }
    }

    async fn request<F>(&self, command: F) -> Result<Result<()>, RecorderError>
    where
        F: FnOnce(oneshot::Sender<Result<()>>) -> RecorderCommand,
    {
        let (reply, rx) = oneshot::channel();
        self.tx.send(command(reply)).await.map_err(|e| {
            tracing::error!("Failed to send recorder command: {}", e);
            RecorderError::RecorderUnavailable
        })?;

        rx.await.map_err(|e| {
            tracing::error!("Failed to receive recorder response: {}", e);
            RecorderError::RecorderUnavailable
        })
    }
}

#[async_trait]
impl CaptureService for RecorderHandle {
    async fn activate(&mut self) -> Result<(), RecorderError> {
        match AudioCapture::default_input_name() {
            Ok(name) => {
                tracing::debug!("Using input device: {}", name);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("{:#}", e);
                Err(RecorderError::InputDeviceUnavailable)
            }
        }
    }

    async fn start(&mut self, path: &Path, format: AudioFormat) -> Result<(), RecorderError> {
        let path = path.to_path_buf();
        self.request(|reply| RecorderCommand::Start {
            path,
            format,
            reply,
        })
        .await?
        .map_err(RecorderError::capture_start)?;

        self.active = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), RecorderError> {
        self.active = false;
        self.request(RecorderCommand::Stop)
            .await?
            .map_err(RecorderError::capture_stop)
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
