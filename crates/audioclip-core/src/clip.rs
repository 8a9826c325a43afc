//! In-memory audio clip

use thiserror::Error;

use crate::effects::AudioEffect;

/// Clip manipulation errors
#[derive(Error, Debug)]
pub enum ClipError {
    #[error("Invalid time range: start {start:.3}s is after end {end:.3}s")]
    InvalidRange { start: f64, end: f64 },

    #[error("Invalid channel count: {0}")]
    InvalidChannels(u16),
}

/// Decoded audio, placed on a timeline
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Interleaved samples
    pub samples: Vec<f32>,
    /// Channel count
    pub channels: u16,
    /// Sample rate
    pub sample_rate: u32,
    /// Timeline start (seconds)
    pub start: f64,
    /// Where the audio came from, if it came from a file
    pub source: Option<String>,
}

impl AudioClip {
    /// Create a clip from interleaved samples, starting at 0
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
            start: 0.0,
            source: None,
        }
    }

    /// Silence of the given length
    pub fn silence(duration: f64, channels: u16, sample_rate: u32) -> Self {
        let frames = seconds_to_frames(duration, sample_rate);
        Self::new(vec![0.0; frames * channels as usize], channels, sample_rate)
    }

    /// Number of sample frames
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Timeline end (seconds)
    pub fn end(&self) -> f64 {
        self.start + self.duration()
    }

    /// Frame index for a time within the clip
    pub fn time_to_frame(&self, time_sec: f64) -> usize {
        seconds_to_frames(time_sec, self.sample_rate).min(self.frames())
    }

    /// Time within the clip for a frame index
    pub fn frame_to_time(&self, frame: usize) -> f64 {
        frame as f64 / self.sample_rate as f64
    }

    /// Place the clip on the timeline
    pub fn with_start(mut self, start: f64) -> Self {
        self.start = start.max(0.0);
        self
    }

    /// Tag the clip with its source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Cut out `[start, end)` of the clip.
    ///
    /// Negative times count back from the end of the clip, `None` for `end`
    /// means the end of the clip. Both bounds are clamped to the clip.
    pub fn subclipped(&self, start: f64, end: Option<f64>) -> Result<AudioClip, ClipError> {
        let duration = self.duration();
        let resolve = |t: f64| {
            let t = if t < 0.0 { duration + t } else { t };
            t.clamp(0.0, duration)
        };

        let start = resolve(start);
        let end = end.map(resolve).unwrap_or(duration);
        if start > end {
            return Err(ClipError::InvalidRange { start, end });
        }

        let channels = self.channels as usize;
        let first = self.time_to_frame(start) * channels;
        let last = self.time_to_frame(end) * channels;

        Ok(AudioClip {
            samples: self.samples[first..last].to_vec(),
            channels: self.channels,
            sample_rate: self.sample_rate,
            start: self.start,
            source: self.source.clone(),
        })
    }

    /// Peak absolute sample value, 0.0 when empty
    pub fn max_volume(&self) -> f32 {
        self.samples
            .iter()
            .map(|s| s.abs())
            .fold(0.0f32, |a, b| a.max(b))
    }

    /// Apply effects in order, returning a new clip
    pub fn with_effects(&self, effects: &[AudioEffect]) -> AudioClip {
        effects
            .iter()
            .fold(self.clone(), |clip, effect| effect.apply(&clip))
    }

    /// Convert to another channel count
    pub fn to_channels(&self, channels: u16) -> Result<AudioClip, ClipError> {
        if channels == 0 {
            return Err(ClipError::InvalidChannels(channels));
        }
        if channels == self.channels {
            return Ok(self.clone());
        }
        if self.channels == 0 {
            return Err(ClipError::InvalidChannels(self.channels));
        }

        let in_ch = self.channels as usize;
        let out_ch = channels as usize;
        let mut samples = Vec::with_capacity(self.frames() * out_ch);

        for frame in self.samples.chunks(in_ch) {
            if in_ch == 1 {
                samples.extend(std::iter::repeat(frame[0]).take(out_ch));
            } else {
                let mono = frame.iter().sum::<f32>() / frame.len() as f32;
                samples.extend(std::iter::repeat(mono).take(out_ch));
            }
        }

        Ok(AudioClip {
            samples,
            channels,
            sample_rate: self.sample_rate,
            start: self.start,
            source: self.source.clone(),
        })
    }
}

pub(crate) fn seconds_to_frames(seconds: f64, sample_rate: u32) -> usize {
    (seconds.max(0.0) * sample_rate as f64).round() as usize
}
