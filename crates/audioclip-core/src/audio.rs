//! Audio decoding, resampling and WAV output

use std::fs::File;
use std::path::Path;

use hound::{WavReader, WavSpec, WavWriter};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, warn};

use crate::clip::AudioClip;
use crate::AudioInfo;

/// Audio I/O errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Hound(#[from] hound::Error),

    #[error("Resample error: {0}")]
    Resample(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

/// Formats decoded through symphonia
const SYMPHONIA_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "flac", "ogg"];

/// Resampler chunk size (frames)
const RESAMPLE_CHUNK: usize = 1024;

/// Loads, resamples and saves clips
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioProcessor;

impl AudioProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Read file metadata without decoding it
    pub fn get_info<P: AsRef<Path>>(&self, path: P) -> Result<AudioInfo, AudioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AudioError::FileNotFound(path.display().to_string()));
        }

        // WAV header is enough
        if lowercase_extension(path).as_deref() == Some("wav") {
            let reader = WavReader::open(path)?;
            let spec = reader.spec();
            let duration = reader.duration() as f64 / spec.sample_rate as f64;

            return Ok(AudioInfo {
                path: path.display().to_string(),
                duration,
                sample_rate: spec.sample_rate,
                channels: spec.channels,
                bits_per_sample: spec.bits_per_sample,
            });
        }

        self.get_info_symphonia(path)
    }

    fn get_info_symphonia(&self, path: &Path) -> Result<AudioInfo, AudioError> {
        let format = open_format(path)?;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::Decode("No audio track found".to_string()))?;

        let codec_params = &track.codec_params;

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| AudioError::Decode("Missing sample rate".to_string()))?;

        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(2);

        let bits_per_sample = codec_params.bits_per_sample.unwrap_or(16) as u16;

        let duration = codec_params
            .n_frames
            .map(|n| n as f64 / sample_rate as f64)
            .unwrap_or(0.0);

        Ok(AudioInfo {
            path: path.display().to_string(),
            duration,
            sample_rate,
            channels,
            bits_per_sample,
        })
    }

    /// Decode a whole file, keeping its channels and sample rate
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<AudioClip, AudioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AudioError::FileNotFound(path.display().to_string()));
        }

        let clip = match lowercase_extension(path).as_deref() {
            Some("wav") => self.load_wav(path)?,
            Some(ext) if SYMPHONIA_EXTENSIONS.contains(&ext) => self.load_symphonia(path)?,
            Some(ext) => return Err(AudioError::UnsupportedFormat(ext.to_string())),
            None => return Err(AudioError::UnsupportedFormat("unknown".to_string())),
        };

        debug!(
            "Decoded {}: {} ch, {} Hz, {:.3}s",
            path.display(),
            clip.channels,
            clip.sample_rate,
            clip.duration()
        );

        Ok(clip.with_source(path.display().to_string()))
    }

    fn load_symphonia(&self, path: &Path) -> Result<AudioClip, AudioError> {
        let mut format = open_format(path)?;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| AudioError::Decode("Missing sample rate".to_string()))?;

        let mut channels = codec_params.channels.map(|c| c.count() as u16);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::Decode(format!("Cannot create decoder: {}", e)))?;

        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(e) => match read_failure(e) {
                    ReadFailure::End => break,
                    ReadFailure::Reset => {
                        decoder.reset();
                        continue;
                    }
                    ReadFailure::Fatal(err) => return Err(err),
                },
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(AudioError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            if channels.is_none() {
                channels = Some(spec.channels.count() as u16);
            }

            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(sample_buf.samples());
        }

        Ok(AudioClip::new(samples, channels.unwrap_or(2), sample_rate))
    }

    fn load_wav(&self, path: &Path) -> Result<AudioClip, AudioError> {
        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => {
                let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect::<Result<Vec<_>, _>>()?
            }
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        };

        Ok(AudioClip::new(samples, spec.channels, spec.sample_rate))
    }

    /// Resample every channel to `to_rate`
    pub fn resample(&self, clip: &AudioClip, to_rate: u32) -> Result<AudioClip, AudioError> {
        use rubato::{FftFixedInOut, Resampler};

        if clip.sample_rate == to_rate || clip.samples.is_empty() {
            return Ok(AudioClip {
                sample_rate: to_rate,
                ..clip.clone()
            });
        }

        let channels = clip.channels.max(1) as usize;
        let frames = clip.frames();
        let ratio = to_rate as f64 / clip.sample_rate as f64;

        let mut resampler = FftFixedInOut::<f32>::new(
            clip.sample_rate as usize,
            to_rate as usize,
            RESAMPLE_CHUNK,
            channels,
        )
        .map_err(|e| AudioError::Resample(e.to_string()))?;

        // Deinterleave
        let mut planar: Vec<Vec<f32>> = vec![Vec::with_capacity(frames); channels];
        for frame in clip.samples.chunks(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                planar[ch].push(sample);
            }
        }

        let mut output: Vec<Vec<f32>> =
            vec![Vec::with_capacity((frames as f64 * ratio) as usize + RESAMPLE_CHUNK * 4); channels];

        // The resampler output lags its input; skip the lag and flush with
        // silence until the whole clip has come out.
        let delay = resampler.output_delay();
        let out_frames = (frames as f64 * ratio).round() as usize;
        let needed = delay + out_frames;

        let mut pos = 0;
        while output[0].len() < needed {
            let chunk = resampler.input_frames_next();
            let start = pos.min(frames);
            let end = (pos + chunk).min(frames);

            let input: Vec<Vec<f32>> = planar
                .iter()
                .map(|ch| {
                    let mut block = ch[start..end].to_vec();
                    block.resize(chunk, 0.0);
                    block
                })
                .collect();

            let result = resampler
                .process(&input, None)
                .map_err(|e| AudioError::Resample(e.to_string()))?;

            for (out, block) in output.iter_mut().zip(result) {
                out.extend_from_slice(&block);
            }
            pos += chunk;
        }

        let mut samples = Vec::with_capacity(out_frames * channels);
        for i in delay..needed {
            for ch in &output {
                samples.push(ch[i]);
            }
        }

        Ok(AudioClip {
            samples,
            sample_rate: to_rate,
            ..clip.clone()
        })
    }

    /// Write a clip as WAV.
    ///
    /// 32 bits writes float samples, anything else writes clamped integers.
    /// `progress` receives values in `[0.0, 1.0]`.
    pub fn save<P: AsRef<Path>>(
        &self,
        clip: &AudioClip,
        path: P,
        bits_per_sample: u16,
        progress: Option<&dyn Fn(f64)>,
    ) -> Result<(), AudioError> {
        let path = path.as_ref();

        match lowercase_extension(path).as_deref() {
            Some("wav") => {}
            Some(ext) => return Err(AudioError::UnsupportedFormat(ext.to_string())),
            None => return Err(AudioError::UnsupportedFormat("unknown".to_string())),
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let spec = WavSpec {
            channels: clip.channels.max(1),
            sample_rate: clip.sample_rate,
            bits_per_sample,
            sample_format: if bits_per_sample == 32 {
                hound::SampleFormat::Float
            } else {
                hound::SampleFormat::Int
            },
        };

        let report = |fraction: f64| {
            if let Some(callback) = progress {
                callback(fraction);
            }
        };

        report(0.0);

        let mut writer = WavWriter::create(path, spec)?;
        let total = clip.samples.len().max(1);
        let step = (total / 100).max(1);

        for (i, &sample) in clip.samples.iter().enumerate() {
            match spec.sample_format {
                hound::SampleFormat::Float => writer.write_sample(sample)?,
                hound::SampleFormat::Int => {
                    let max_val = (1i64 << (bits_per_sample - 1)) as f32;
                    let int_sample = (sample * max_val).clamp(-max_val, max_val - 1.0) as i32;
                    writer.write_sample(int_sample)?;
                }
            }

            if i % step == 0 {
                report(i as f64 / total as f64);
            }
        }

        writer.finalize()?;
        report(1.0);
        Ok(())
    }
}

/// What to do when the container stops yielding packets
#[derive(Debug)]
enum ReadFailure {
    /// Stream finished
    End,
    /// Stream changed shape, the decoder must be reset
    Reset,
    /// Unrecoverable
    Fatal(AudioError),
}

fn read_failure(err: SymphoniaError) -> ReadFailure {
    match err {
        SymphoniaError::IoError(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            ReadFailure::End
        }
        SymphoniaError::ResetRequired => ReadFailure::Reset,
        other => ReadFailure::Fatal(AudioError::Decode(format!("Cannot read packet: {}", other))),
    }
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn open_format(path: &Path) -> Result<Box<dyn symphonia::core::formats::FormatReader>, AudioError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let opened = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioError::Decode(format!("Unrecognized format: {}", e)))?;

    Ok(opened.format)
}
