use super::format::AudioFormat;
use super::sink::AudioSink;
use anyhow::{Context, Result};
use async_trait::async_trait;
use ogg::writing::{PacketWriteEndInfo, PacketWriter};
use opus::{Application, Bitrate, Channels, Encoder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tokio::sync::{mpsc, oneshot};

/// Granule positions and pre-skip in Ogg Opus are always counted at 48 kHz
pub const OPUS_GRANULE_RATE: u32 = 48000;

const VENDOR: &str = "voice-memo";
const FRAME_MS: u32 = 20;
const MAX_PACKET: usize = 4000;

enum OpusCommand {
    WriteChunk(Vec<f32>),
    Finalize { reply: oneshot::Sender<Result<()>> },
}

/// Ogg Opus encoder using a dedicated blocking thread for I/O
///
/// Samples are framed into 20 ms packets and encoded at the format's bit
/// rate. Creating the sink truncates the file at `path`.
pub struct OpusSink {
    tx: mpsc::UnboundedSender<OpusCommand>,
}

impl OpusSink {
    pub fn new(path: &Path, format: AudioFormat) -> Result<Self> {
        let channels = match format.channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            n => anyhow::bail!("Opus supports 1 or 2 channels, got {}", n),
        };

        let mut encoder = Encoder::new(format.sample_rate, channels, Application::Voip)
            .with_context(|| format!("Failed to create Opus encoder at {} Hz", format.sample_rate))?;
        encoder
            .set_bitrate(Bitrate::Bits(format.bit_rate as i32))
            .with_context(|| format!("Failed to set Opus bit rate to {}", format.bit_rate))?;
        let lookahead = encoder
            .get_lookahead()
            .context("Failed to query Opus lookahead")? as u64;

        let file = File::create(path)
            .with_context(|| format!("Failed to create Opus file {}", path.display()))?;

        let mut stream = OggOpusStream::new(BufWriter::new(file), encoder, format, lookahead);
        stream.write_headers().context("Failed to write Opus headers")?;

        let (tx, mut rx) = mpsc::unbounded_channel();

        std::thread::spawn(move || {
            let mut write_error: Option<anyhow::Error> = None;

            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    OpusCommand::WriteChunk(samples) => {
                        if write_error.is_some() {
                            continue;
                        }
                        if let Err(e) = stream.push(&samples) {
                            tracing::error!("Failed to encode audio: {:#}", e);
                            write_error = Some(e);
                        }
                    }
                    OpusCommand::Finalize { reply } => {
                        let result = match write_error.take() {
                            Some(e) => Err(e.context("Failed to write Opus stream")),
                            None => stream.finish().context("Failed to finalize Opus stream"),
                        };
                        let _ = reply.send(result);
                        return;
                    }
                }
            }
        });

        Ok(Self { tx })
    }
}

#[async_trait]
impl AudioSink for OpusSink {
    fn write_chunk(&mut self, samples: Vec<f32>) -> Result<()> {
        self.tx
            .send(OpusCommand::WriteChunk(samples))
            .map_err(|e| anyhow::anyhow!("Failed to send write command: {}", e))
    }

    async fn finalize(&mut self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(OpusCommand::Finalize { reply })
            .map_err(|e| anyhow::anyhow!("Failed to send finalize command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive finalize response: {}", e))?
    }
}

struct OggOpusStream<W: Write> {
    packets: PacketWriter<'static, W>,
    encoder: Encoder,
    serial: u32,
    channels: usize,
    input_rate: u32,
    /// Interleaved samples per packet
    frame_len: usize,
    /// Encoder delay, in samples per channel at the input rate
    lookahead: u64,
    pending: Vec<f32>,
    /// Samples per channel received from capture
    captured: u64,
    /// Samples per channel handed to the encoder, padding included
    encoded: u64,
    /// The last packet is held back so it can close the stream
    held: Option<(Vec<u8>, u64)>,
}

impl<W: Write> OggOpusStream<W> {
    fn new(writer: W, encoder: Encoder, format: AudioFormat, lookahead: u64) -> Self {
        let channels = format.channels as usize;
        let serial = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0x766d);

        Self {
            packets: PacketWriter::new(writer),
            encoder,
            serial,
            channels,
            input_rate: format.sample_rate,
            frame_len: (format.sample_rate * FRAME_MS / 1000) as usize * channels,
            lookahead,
            pending: Vec::new(),
            captured: 0,
            encoded: 0,
            held: None,
        }
    }

    fn to_granule(&self, samples: u64) -> u64 {
        samples * OPUS_GRANULE_RATE as u64 / self.input_rate as u64
    }

    fn pre_skip(&self) -> u64 {
        self.to_granule(self.lookahead)
    }

    fn write_headers(&mut self) -> Result<()> {
        let head = opus_head(self.channels as u8, self.pre_skip() as u16, self.input_rate);
        self.packets
            .write_packet(head, self.serial, PacketWriteEndInfo::EndPage, 0)?;
        self.packets
            .write_packet(opus_tags(), self.serial, PacketWriteEndInfo::EndPage, 0)?;
        Ok(())
    }

    fn push(&mut self, samples: &[f32]) -> Result<()> {
        self.captured += (samples.len() / self.channels) as u64;
        self.pending.extend_from_slice(samples);
        self.encode_full_frames()
    }

    fn encode_full_frames(&mut self) -> Result<()> {
        let mut packet = [0u8; MAX_PACKET];

        while self.pending.len() >= self.frame_len {
            let frame: Vec<f32> = self.pending.drain(..self.frame_len).collect();
            let len = self.encoder.encode_float(&frame, &mut packet)?;
            self.encoded += (self.frame_len / self.channels) as u64;

            let granule = self.pre_skip() + self.to_granule(self.encoded);
            if let Some((data, held_granule)) = self.held.replace((packet[..len].to_vec(), granule)) {
                self.packets.write_packet(
                    data,
                    self.serial,
                    PacketWriteEndInfo::NormalPacket,
                    held_granule,
                )?;
            }
        }

        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        // Push the encoder's delay line out, then pad to a whole frame
        let flush = self.lookahead as usize * self.channels;
        self.pending.extend(std::iter::repeat_n(0.0, flush));
        let partial = self.pending.len() % self.frame_len;
        if partial != 0 || self.held.is_none() {
            let padding = self.frame_len - partial;
            self.pending.extend(std::iter::repeat_n(0.0, padding));
        }
        self.encode_full_frames()?;

        // The final granule trims the padding back off
        let end = self.pre_skip() + self.to_granule(self.captured);
        if let Some((data, _)) = self.held.take() {
            self.packets
                .write_packet(data, self.serial, PacketWriteEndInfo::EndStream, end)?;
        }

        self.packets
            .into_inner()
            .flush()
            .context("Failed to flush Opus file")?;
        Ok(())
    }
}

fn opus_head(channels: u8, pre_skip: u16, input_rate: u32) -> Vec<u8> {
    let mut head = Vec::with_capacity(19);
    head.extend_from_slice(b"OpusHead");
    head.push(1); // version
    head.push(channels);
    head.extend_from_slice(&pre_skip.to_le_bytes());
    head.extend_from_slice(&input_rate.to_le_bytes());
    head.extend_from_slice(&0i16.to_le_bytes()); // output gain
    head.push(0); // mapping family: mono or stereo
    head
}

fn opus_tags() -> Vec<u8> {
    let mut tags = Vec::with_capacity(16 + VENDOR.len());
    tags.extend_from_slice(b"OpusTags");
    tags.extend_from_slice(&(VENDOR.len() as u32).to_le_bytes());
    tags.extend_from_slice(VENDOR.as_bytes());
    tags.extend_from_slice(&0u32.to_le_bytes()); // no user comments
    tags
}
