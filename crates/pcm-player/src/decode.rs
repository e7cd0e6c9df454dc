//! Decode stage: the render pipeline that feeds the bridge.
//!
//! Uses Symphonia to:
//! - probe the input container/codec
//! - decode packets and repack them as big-endian PCM at the source bit depth
//! - hand fixed-size messages to the bridge from a background thread
//!
//! The thread reports how it ended over a `crossbeam-channel`.

use std::fs::File;
use std::path::Path;
use std::thread;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::Sender;
use pcm_bridge::{BridgeError, PcmFormat, PcmProducer, PlayableAudioMessage, SampleWidth};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Bit depth assumed when the container does not report one.
const DEFAULT_BIT_DEPTH: u32 = 16;

/// Stream properties captured while probing.
#[derive(Clone, Debug)]
pub struct SourceInfo {
    pub format: PcmFormat,
    pub sample_rate: u32,
    pub duration_ms: Option<u64>,
    pub codec: Option<String>,
}

/// How the decode thread finished.
#[derive(Debug)]
pub enum DecodeEvent {
    /// End of stream; every decoded frame was handed to the bridge.
    Finished { messages: u64, frames: u64 },
    /// The bridge was closed before the stream ended.
    Cancelled,
    Failed(String),
}

/// A probed source ready to be decoded.
pub struct ProbedSource {
    pub info: SourceInfo,
    format: Box<dyn FormatReader>,
    codec_params: CodecParameters,
}

/// Open and probe `path`.
pub fn probe_file(path: &Path) -> Result<ProbedSource> {
    let file = File::open(path).with_context(|| format!("open {:?}", path))?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("No default audio track"))?;
    let codec_params = track.codec_params.clone();

    let channels = codec_params
        .channels
        .ok_or_else(|| anyhow!("Unknown channels"))?
        .count();
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("Unknown sample rate"))?;
    let bits = codec_params
        .bits_per_sample
        .or(codec_params.bits_per_coded_sample)
        .unwrap_or(DEFAULT_BIT_DEPTH);

    let channels = u16::try_from(channels).context("channel count out of range")?;
    let pcm_format = PcmFormat::new(SampleWidth::for_bit_depth(bits), channels)?;

    let info = SourceInfo {
        format: pcm_format,
        sample_rate,
        duration_ms: duration_ms_from_codec_params(&codec_params),
        codec: codec_name_from_params(&codec_params),
    };

    Ok(ProbedSource {
        info,
        format,
        codec_params,
    })
}

/// Start the decode thread, feeding `producer` with messages of
/// `message_frames` frames.
pub fn spawn_decoder(
    source: ProbedSource,
    producer: PcmProducer,
    message_frames: usize,
    events: Sender<DecodeEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let event = match decode_loop(source, producer, message_frames) {
            Ok(ev) => ev,
            Err(e) => {
                tracing::error!("decoder thread error: {e:#}");
                DecodeEvent::Failed(format!("{e:#}"))
            }
        };
        let _ = events.send(event);
    })
}

/// Decode every packet and push big-endian PCM messages into the bridge.
fn decode_loop(
    source: ProbedSource,
    mut producer: PcmProducer,
    message_frames: usize,
) -> Result<DecodeEvent> {
    let ProbedSource {
        info,
        mut format,
        codec_params,
    } = source;
    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let pcm = info.format;
    let message_bytes = pcm.frames_to_bytes(message_frames);
    let mut pending: Vec<u8> = Vec::with_capacity(message_bytes);
    let mut messages = 0u64;
    let mut frames = 0u64;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(_) => break, // EOF
        };

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!("skipping undecodable packet: {e}");
                continue;
            }
        };

        let mut sample_buf = SampleBuffer::<i32>::new(decoded.frames() as u64, *decoded.spec());
        sample_buf.copy_interleaved_ref(decoded);
        for &s in sample_buf.samples() {
            push_sample_be(&mut pending, s, pcm.sample_width);
        }

        while pending.len() >= message_bytes {
            let rest = pending.split_off(message_bytes);
            let chunk = std::mem::replace(&mut pending, rest);
            match send(&mut producer, pcm, chunk)? {
                Some(n) => {
                    messages += 1;
                    frames += n;
                }
                None => return Ok(DecodeEvent::Cancelled),
            }
        }
    }

    if !pending.is_empty() {
        match send(&mut producer, pcm, pending)? {
            Some(n) => {
                messages += 1;
                frames += n;
            }
            None => return Ok(DecodeEvent::Cancelled),
        }
    }

    tracing::info!(messages, frames, "decode finished");
    Ok(DecodeEvent::Finished { messages, frames })
}

/// Enqueue one message; `Ok(None)` when the bridge has been closed.
fn send(producer: &mut PcmProducer, format: PcmFormat, bytes: Vec<u8>) -> Result<Option<u64>> {
    let message = PlayableAudioMessage::new(format, bytes)?;
    let frames = message.frames() as u64;
    match producer.enqueue(message) {
        Ok(()) => Ok(Some(frames)),
        Err(BridgeError::Closed) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Append a full-scale `i32` sample as big-endian PCM of `width`.
fn push_sample_be(out: &mut Vec<u8>, sample: i32, width: SampleWidth) {
    let be = sample.to_be_bytes();
    out.extend_from_slice(&be[..width.bytes()]);
}

/// Best-effort duration in milliseconds from codec metadata.
fn duration_ms_from_codec_params(codec_params: &CodecParameters) -> Option<u64> {
    let frames = codec_params.n_frames?;
    let rate = codec_params.sample_rate? as u64;
    if rate == 0 {
        return None;
    }
    Some(frames.saturating_mul(1000) / rate)
}

/// Best-effort codec label for logs.
fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM_S32",
        CODEC_TYPE_PCM_U8 | CODEC_TYPE_PCM_S8 => "PCM_8",
        _ => return None,
    };
    Some(name.to_string())
}
