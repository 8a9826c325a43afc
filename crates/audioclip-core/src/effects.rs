//! Audio effects

use crate::clip::{seconds_to_frames, AudioClip};

/// Effect that turns one clip into another
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioEffect {
    /// Multiply every sample by a factor
    MultiplyVolume(f64),
    /// Scale so the peak sample reaches 1.0
    AudioNormalize,
    /// Repeat the clip until it lasts `duration` seconds
    AudioLoop { duration: f64 },
}

impl AudioEffect {
    /// Apply the effect, leaving the input untouched
    pub fn apply(&self, clip: &AudioClip) -> AudioClip {
        match *self {
            AudioEffect::MultiplyVolume(factor) => multiply_volume(clip, factor as f32),
            AudioEffect::AudioNormalize => {
                let peak = clip.max_volume();
                if peak == 0.0 {
                    clip.clone()
                } else {
                    multiply_volume(clip, 1.0 / peak)
                }
            }
            AudioEffect::AudioLoop { duration } => audio_loop(clip, duration),
        }
    }
}

impl std::fmt::Display for AudioEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioEffect::MultiplyVolume(factor) => write!(f, "multiply_volume({:.3})", factor),
            AudioEffect::AudioNormalize => write!(f, "normalize"),
            AudioEffect::AudioLoop { duration } => write!(f, "loop({:.3}s)", duration),
        }
    }
}

fn multiply_volume(clip: &AudioClip, factor: f32) -> AudioClip {
    AudioClip {
        samples: clip.samples.iter().map(|s| s * factor).collect(),
        ..clip.clone()
    }
}

fn audio_loop(clip: &AudioClip, duration: f64) -> AudioClip {
    let channels = clip.channels.max(1) as usize;
    let total = seconds_to_frames(duration, clip.sample_rate) * channels;

    let samples = if clip.samples.is_empty() {
        vec![0.0; total]
    } else {
        clip.samples.iter().copied().cycle().take(total).collect()
    };

    AudioClip {
        samples,
        ..clip.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiply_volume() {
        let clip = AudioClip::new(vec![0.5, -0.25], 1, 10);
        let out = AudioEffect::MultiplyVolume(0.5).apply(&clip);
        assert_eq!(out.samples, vec![0.25, -0.125]);
        // input untouched
        assert_eq!(clip.samples, vec![0.5, -0.25]);
    }

    #[test]
    fn test_normalize() {
        let clip = AudioClip::new(vec![0.1, -0.4, 0.2], 1, 10);
        let out = AudioEffect::AudioNormalize.apply(&clip);
        assert!((out.max_volume() - 1.0).abs() < 1e-6);
        assert!((out.samples[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_silence() {
        let clip = AudioClip::new(vec![0.0; 8], 2, 10);
        assert_eq!(AudioEffect::AudioNormalize.apply(&clip), clip);
    }

    #[test]
    fn test_loop_exact_length() {
        let clip = AudioClip::new(vec![1.0, 2.0, 3.0, 4.0], 2, 4);
        let out = AudioEffect::AudioLoop { duration: 2.5 }.apply(&clip);
        assert_eq!(out.frames(), 10);
        assert_eq!(&out.samples[..6], &[1.0, 2.0, 3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn test_loop_shorter_than_source_truncates() {
        let clip = AudioClip::new((0..100).map(|i| i as f32).collect(), 1, 100);
        let out = AudioEffect::AudioLoop { duration: 0.3 }.apply(&clip);
        assert_eq!(out.samples, (0..30).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_loop_empty_source_gives_silence() {
        let clip = AudioClip::new(vec![], 1, 100);
        let out = AudioEffect::AudioLoop { duration: 1.0 }.apply(&clip);
        assert_eq!(out.frames(), 100);
        assert_eq!(out.max_volume(), 0.0);
    }
}
