use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};

use super::source::PcmSource;
use crate::error::{EngineError, Result};

/// File-backed source decoded with symphonia.
///
/// Seeking asks the container for the packet at or before the target, then
/// discards decoded frames up to it, so the read point is sample-accurate no
/// matter how coarse the container's seek index is. Containers that cannot
/// seek fall back to re-opening and decoding forward.
pub struct SymphoniaSource {
    path: PathBuf,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    sample_rate: u32,
    channels: u16,
    declared_duration: Option<f64>,
    sample_buf: Option<SampleBuffer<f32>>,
    /// Decoded samples not yet handed out
    pending: Vec<f32>,
    pending_pos: usize,
    finished: bool,
}

struct OpenedStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    sample_rate: u32,
    channels: u16,
    declared_duration: Option<f64>,
}

fn open_stream(path: &Path) -> Result<OpenedStream> {
    let file = std::fs::File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            EngineError::SourceNotFound(path.to_path_buf())
        } else {
            EngineError::Decode(format!("failed to open {}: {}", path.display(), e))
        }
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| EngineError::Decode(format!("failed to probe {}: {}", path.display(), e)))?;

    let format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| EngineError::Decode(format!("no audio tracks in {}", path.display())))?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count()) as u16;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| EngineError::Decode("unknown sample rate".into()))?;
    let time_base = track.codec_params.time_base;
    let declared_duration = track
        .codec_params
        .n_frames
        .map(|frames| frames as f64 / sample_rate as f64);

    let decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())?;

    Ok(OpenedStream {
        format,
        decoder,
        track_id,
        time_base,
        sample_rate,
        channels,
        declared_duration,
    })
}

impl SymphoniaSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream = open_stream(path)?;

        log::info!(
            "Opened {}: {}Hz, {} ch, declared {}",
            path.display(),
            stream.sample_rate,
            stream.channels,
            stream
                .declared_duration
                .map_or_else(|| "unknown".to_string(), |d| format!("{:.3}s", d))
        );

        Ok(Self {
            path: path.to_path_buf(),
            format: stream.format,
            decoder: stream.decoder,
            track_id: stream.track_id,
            time_base: stream.time_base,
            sample_rate: stream.sample_rate,
            channels: stream.channels,
            declared_duration: stream.declared_duration,
            sample_buf: None,
            pending: Vec::new(),
            pending_pos: 0,
            finished: false,
        })
    }

    /// Decode the next packet of our track into `pending`. Returns false at
    /// end of stream.
    fn decode_next(&mut self) -> Result<bool> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(false),
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(msg)) => {
                    log::debug!("Skipping undecodable packet: {}", msg);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let needed = decoded.capacity() * spec.channels.count();
            if self.sample_buf.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                self.sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
            }

            if let Some(buf) = self.sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
                self.pending.clear();
                self.pending.extend_from_slice(buf.samples());
                self.pending_pos = 0;
            }
            return Ok(true);
        }
    }

    /// Track timestamp of `frame`. Most audio tracks count in frames already.
    fn frame_to_ts(&self, frame: u64) -> u64 {
        match self.time_base {
            Some(tb) if !(tb.numer == 1 && tb.denom == self.sample_rate) => {
                tb.calc_timestamp(Time::from(frame as f64 / self.sample_rate as f64))
            }
            _ => frame,
        }
    }

    fn ts_to_frame(&self, ts: u64) -> u64 {
        match self.time_base {
            Some(tb) if !(tb.numer == 1 && tb.denom == self.sample_rate) => {
                let time = tb.calc_time(ts);
                ((time.seconds as f64 + time.frac) * self.sample_rate as f64).round() as u64
            }
            _ => ts,
        }
    }

    /// Seek the container to the packet holding `frame` and discard up to it.
    /// Fails if the container cannot seek there.
    fn seek_container(&mut self, frame: u64) -> Result<()> {
        let seeked = self.format.seek(
            SeekMode::Accurate,
            SeekTo::TimeStamp {
                ts: self.frame_to_ts(frame),
                track_id: self.track_id,
            },
        )?;
        self.decoder.reset();
        self.pending.clear();
        self.pending_pos = 0;
        self.finished = false;

        let landed = self.ts_to_frame(seeked.actual_ts);
        let gap = frame.saturating_sub(landed) as usize;
        log::debug!(
            "Container seek to frame {} landed on {}, skipping {}",
            frame,
            landed,
            gap
        );
        self.skip(gap * self.channels as usize)
    }

    /// Drop `samples` interleaved samples from the front of the stream.
    fn skip(&mut self, mut samples: usize) -> Result<()> {
        while samples > 0 {
            if self.pending_pos >= self.pending.len() {
                if !self.decode_next()? {
                    self.finished = true;
                    return Ok(());
                }
            }
            let take = samples.min(self.pending.len() - self.pending_pos);
            self.pending_pos += take;
            samples -= take;
        }
        Ok(())
    }
}

impl PcmSource for SymphoniaSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn declared_duration(&self) -> Option<f64> {
        self.declared_duration
    }

    fn read(&mut self, out: &mut [f32]) -> Result<usize> {
        let channels = self.channels as usize;
        let wanted = out.len() / channels * channels;
        let mut written = 0;

        while written < wanted && !self.finished {
            if self.pending_pos >= self.pending.len() {
                if !self.decode_next()? {
                    self.finished = true;
                    break;
                }
            }
            let take = (wanted - written).min(self.pending.len() - self.pending_pos);
            out[written..written + take]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + take]);
            self.pending_pos += take;
            written += take;
        }

        Ok(written)
    }

    fn rewind(&mut self) -> Result<()> {
        let stream = open_stream(&self.path)?;
        self.format = stream.format;
        self.decoder = stream.decoder;
        self.track_id = stream.track_id;
        self.pending.clear();
        self.pending_pos = 0;
        self.finished = false;
        Ok(())
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        let frame = (seconds.max(0.0) * self.sample_rate as f64).round() as u64;
        if frame == 0 {
            return self.rewind();
        }
        if let Err(err) = self.seek_container(frame) {
            log::debug!("Container seek failed ({}), decoding forward from the start", err);
            self.rewind()?;
            self.skip(frame as usize * self.channels as usize)?;
        }
        Ok(())
    }
}
