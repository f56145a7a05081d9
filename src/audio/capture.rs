use super::format::AudioFormat;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use ringbuf::{HeapRb, traits::*};
use std::sync::Arc;
use tokio::sync::{Notify, mpsc, oneshot};

pub struct AudioCapture;

/// A running input stream and the bridge forwarding its samples
///
/// Must be kept alive for audio capture to continue.
pub struct ActiveCapture {
    stream: cpal::Stream,
    flush_tx: oneshot::Sender<()>,
}

impl ActiveCapture {
    /// Halt the input stream and let the bridge forward whatever is buffered
    ///
    /// The chunk channel closes once the last sample has been sent.
    pub fn finish(self) {
        drop(self.stream);
        let _ = self.flush_tx.send(());
    }
}

impl AudioCapture {
    /// Check that the host has a default input device to record from
    pub fn default_input_name() -> Result<String> {
        let device = cpal::default_host()
            .default_input_device()
            .context("No input audio device available")?;

        Ok(device.name().unwrap_or_else(|_| "unknown device".to_string()))
    }

    /// Start audio capture
    ///
    /// Audio chunks are sent via chunk_tx until `ActiveCapture::finish`.
    pub fn start(format: AudioFormat, chunk_tx: mpsc::Sender<Vec<f32>>) -> Result<ActiveCapture> {
        let ring = HeapRb::<f32>::new(format.samples_for_duration(60.0));
        let (mut producer, consumer) = ring.split();

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("No input audio device available")?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let notify = Arc::new(Notify::new());
        let notify_callback = notify.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    producer.push_slice(data);
                    notify_callback.notify_one();
                },
                move |err| {
                    tracing::error!("Audio stream error: {}", err);
                },
                None,
            )
            .with_context(|| {
                format!(
                    "Failed to build input stream ({} Hz, {} channel(s))",
                    format.sample_rate, format.channels
                )
            })?;

        stream.play().context("Failed to start audio stream")?;

        let (flush_tx, flush_rx) = oneshot::channel();
        let chunk_size = format.samples_for_duration(0.1);
        tokio::task::spawn_local(Self::bridge_task(
            consumer, chunk_tx, chunk_size, notify, flush_rx,
        ));

        tracing::info!("Audio capture started");
        Ok(ActiveCapture { stream, flush_tx })
    }

    async fn bridge_task(
        mut consumer: impl Consumer<Item = f32>,
        tx: mpsc::Sender<Vec<f32>>,
        chunk_size: usize,
        notify: Arc<Notify>,
        mut flush_rx: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = notify.notified() => {}
                // Sent on finish, or dropped along with the capture
                _ = &mut flush_rx => break,
            }

            while consumer.occupied_len() >= chunk_size {
                let mut chunk = vec![0.0f32; chunk_size];
                let n = consumer.pop_slice(&mut chunk);
                chunk.truncate(n);

                if tx.send(chunk).await.is_err() {
                    return;
                }
            }
        }

        // Forward the tail, including the last partial chunk
        while consumer.occupied_len() > 0 {
            let mut chunk = vec![0.0f32; consumer.occupied_len().min(chunk_size)];
            let n = consumer.pop_slice(&mut chunk);
            chunk.truncate(n);

            if tx.send(chunk).await.is_err() {
                return;
            }
        }

        tracing::debug!("Capture bridge flushed and exited");
    }
}
