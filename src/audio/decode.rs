use super::opus_sink::OPUS_GRANULE_RATE;
use anyhow::{Context, Result};
use ogg::reading::PacketReader;
use opus::{Channels, Decoder};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Longest Opus packet is 120 ms at 48 kHz
const MAX_FRAME: usize = 5760;

pub struct DecodedAudio {
    pub channels: u16,
    pub sample_rate: u32,
    /// Interleaved, with the encoder delay and end padding trimmed off
    pub samples: Vec<f32>,
}

/// Whether the file starts with an Ogg page
pub fn is_ogg(path: &Path) -> Result<bool> {
    let mut magic = [0u8; 4];
    let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(&magic == b"OggS"),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Decode a whole Ogg Opus file to 48 kHz float samples
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = PacketReader::new(BufReader::new(file));

    let head = reader
        .read_packet()?
        .context("Ogg stream has no packets")?;
    let (channels, pre_skip) = parse_head(&head.data)?;

    reader
        .read_packet()?
        .context("Ogg stream ends before the comment header")?;

    let mut decoder = Decoder::new(
        OPUS_GRANULE_RATE,
        if channels == 1 { Channels::Mono } else { Channels::Stereo },
    )
    .context("Failed to create Opus decoder")?;

    let width = channels as usize;
    let mut frame = vec![0.0f32; MAX_FRAME * width];
    let mut pcm = Vec::new();
    let mut end_granule = 0;

    while let Some(packet) = reader.read_packet()? {
        let n = decoder
            .decode_float(&packet.data, &mut frame, false)
            .context("Failed to decode Opus packet")?;
        pcm.extend_from_slice(&frame[..n * width]);
        end_granule = packet.absgp_page();
    }

    let kept = end_granule.saturating_sub(pre_skip) as usize * width;
    let samples = pcm
        .into_iter()
        .skip(pre_skip as usize * width)
        .take(kept)
        .collect();

    Ok(DecodedAudio {
        channels,
        sample_rate: OPUS_GRANULE_RATE,
        samples,
    })
}

fn parse_head(data: &[u8]) -> Result<(u16, u64)> {
    if data.len() < 19 || &data[..8] != b"OpusHead" {
        anyhow::bail!("Not an Opus stream");
    }
    let channels = data[9] as u16;
    if !(1..=2).contains(&channels) || data[18] != 0 {
        anyhow::bail!("Unsupported Opus channel layout ({} channels)", channels);
    }
    let pre_skip = u16::from_le_bytes([data[10], data[11]]) as u64;
    Ok((channels, pre_skip))
}
