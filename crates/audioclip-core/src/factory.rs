//! Audio clip factory
//!
//! Turns [`AudioAsset`] descriptions into processed [`AudioClip`]s, mixes
//! them onto one timeline and writes the result.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::asset::{Action, ActionKind, AudioAsset};
use crate::audio::{AudioError, AudioProcessor};
use crate::clip::{AudioClip, ClipError};
use crate::effects::AudioEffect;
use crate::types::{ClipSummary, RenderReport};

/// Factory errors
#[derive(Error, Debug)]
pub enum FactoryError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Clip(#[from] ClipError),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Nothing to render")]
    NoClips,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Factory settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Sample rate written by `save_audio_clip`
    pub output_sample_rate: u32,
    /// Bit depth written by `save_audio_clip`
    pub output_bits_per_sample: u16,
    /// Fraction of background music dropped from the front before looping
    pub loop_trim_fraction: f64,
    /// Upper peak bound for looped background music
    pub max_volume_threshold: f64,
    /// Lower peak bound for looped background music
    pub min_volume_threshold: f64,
    /// Overshoot applied to each levelling step
    pub smoothing_factor: f64,
    /// Cap on levelling passes
    pub max_leveling_iterations: u32,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            output_sample_rate: 44100,
            output_bits_per_sample: 16,
            loop_trim_fraction: 0.15,
            max_volume_threshold: 0.3,
            min_volume_threshold: 0.1,
            smoothing_factor: 0.1,
            max_leveling_iterations: 16,
        }
    }
}

impl FactoryConfig {
    /// Read settings from a JSON file, missing fields take defaults
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, FactoryError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Builds and processes audio clips
pub struct AudioClipFactory {
    config: FactoryConfig,
    processor: AudioProcessor,
}

impl AudioClipFactory {
    pub fn new(config: FactoryConfig) -> Self {
        Self {
            config,
            processor: AudioProcessor::new(),
        }
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Load the asset's source and run its parameters and actions
    pub fn create_audio_clip(&self, asset: &AudioAsset) -> Result<AudioClip, FactoryError> {
        let params = &asset.parameters;

        let mut clip = match self.processor.load(&params.url) {
            Ok(clip) => {
                info!("Loaded audio file: {}", params.url);
                clip
            }
            Err(e) => {
                error!("Error loading audio file {}: {}", params.url, e);
                return Err(e.into());
            }
        };

        if params.start.is_some() || params.end.is_some() {
            clip = clip.subclipped(params.start.unwrap_or(0.0), params.end)?;
        }

        if let Some(volume) = params.volume {
            clip = self.adjust_volume(&clip, volume);
        }

        let clip = self.apply_audio_effects(clip, &asset.actions)?;

        Ok(clip.with_start(params.offset.unwrap_or(0.0)))
    }

    /// Run each recognised action in order
    pub fn apply_audio_effects(
        &self,
        mut clip: AudioClip,
        actions: &[Action],
    ) -> Result<AudioClip, FactoryError> {
        for action in actions {
            let Some(kind) = action.resolve()? else {
                warn!("Ignoring unknown action type: {}", action.kind);
                continue;
            };

            clip = match kind {
                ActionKind::NormalizeMusic => {
                    info!("Applying normalization");
                    self.normalize_music(&clip)
                }
                ActionKind::LoopBackgroundMusic(duration) => {
                    info!("Looping background music");
                    self.loop_background_music(&clip, duration)?
                }
                ActionKind::VolumePercentage(factor) => {
                    info!("Adjusting volume to {}%", factor * 100.0);
                    self.adjust_volume(&clip, factor)
                }
            };
        }

        Ok(clip)
    }

    /// Scale the peak to full scale
    pub fn normalize_music(&self, clip: &AudioClip) -> AudioClip {
        clip.with_effects(&[AudioEffect::AudioNormalize])
    }

    /// Loop background music to `target_duration` and pull its peak into
    /// the configured volume window.
    pub fn loop_background_music(
        &self,
        clip: &AudioClip,
        target_duration: f64,
    ) -> Result<AudioClip, FactoryError> {
        let trim_start = clip.duration() * self.config.loop_trim_fraction;
        let looped = clip
            .subclipped(trim_start, None)?
            .with_effects(&[AudioEffect::AudioLoop {
                duration: target_duration,
            }]);
        info!("Music looped to {} seconds", target_duration);

        let max = self.config.max_volume_threshold;
        let min = self.config.min_volume_threshold;
        let smoothing = self.config.smoothing_factor;

        let mut detected = looped.max_volume() as f64;
        if detected == 0.0 {
            warn!("Looped music is silent, skipping volume levelling");
            return Ok(looped);
        }

        let mut factor = 1.0;
        let mut leveled = looped.clone();
        let mut passes = 0;

        while (detected > max || detected < min) && passes < self.config.max_leveling_iterations {
            if detected > max {
                factor *= max / detected * (1.0 - smoothing);
                debug!("Volume too high ({:.2}), reducing", detected);
            } else {
                factor *= min / detected * (1.0 + smoothing);
                debug!("Volume too low ({:.2}), increasing", detected);
            }

            // Factor is cumulative, so always scale the unlevelled loop
            leveled = self.adjust_volume(&looped, factor);
            detected = leveled.max_volume() as f64;
            passes += 1;
        }

        if detected > max || detected < min {
            warn!(
                "Volume still out of range ({:.2}) after {} passes",
                detected, passes
            );
        } else {
            info!("Volume is within the acceptable range ({:.2})", detected);
        }

        Ok(leveled)
    }

    /// Multiply the volume by `factor`
    pub fn adjust_volume(&self, clip: &AudioClip, factor: f64) -> AudioClip {
        debug!("Adjusting volume by a factor of {:.2}", factor);
        clip.with_effects(&[AudioEffect::MultiplyVolume(factor)])
    }

    /// Mix clips onto one timeline.
    ///
    /// The result uses the highest sample rate and channel count among the
    /// inputs and lasts until the latest clip ends. Returns `None` for an
    /// empty list.
    pub fn merge_audio_clips(
        &self,
        clips: &[AudioClip],
    ) -> Result<Option<AudioClip>, FactoryError> {
        if clips.is_empty() {
            warn!("No audio clips to merge");
            return Ok(None);
        }

        info!("Merging {} audio clips", clips.len());

        let sample_rate = clips.iter().map(|c| c.sample_rate).max().unwrap_or(0);
        let channels = clips.iter().map(|c| c.channels).max().unwrap_or(1).max(1);
        let out_ch = channels as usize;

        let mut mixed: Vec<f32> = Vec::new();

        for clip in clips {
            let clip = self
                .processor
                .resample(clip, sample_rate)?
                .to_channels(channels)?;

            let offset = (clip.start * sample_rate as f64).round() as usize * out_ch;
            let needed = offset + clip.samples.len();
            if mixed.len() < needed {
                mixed.resize(needed, 0.0);
            }

            for (dst, src) in mixed[offset..needed].iter_mut().zip(&clip.samples) {
                *dst += src;
            }
        }

        Ok(Some(AudioClip::new(mixed, channels, sample_rate)))
    }

    /// Resample to the output rate and write the clip as WAV
    pub fn save_audio_clip<P: AsRef<Path>>(
        &self,
        clip: &AudioClip,
        output_file: P,
        progress: Option<&dyn Fn(f64)>,
    ) -> Result<(), FactoryError> {
        let output_file = output_file.as_ref();
        let clip = self.processor.resample(clip, self.config.output_sample_rate)?;

        info!("Saving audio clip to {}", output_file.display());
        self.processor.save(
            &clip,
            output_file,
            self.config.output_bits_per_sample,
            progress,
        )?;
        Ok(())
    }

    /// Build every asset, mix them and write the result
    pub fn render<P: AsRef<Path>>(
        &self,
        assets: &[AudioAsset],
        output_file: P,
    ) -> Result<RenderReport, FactoryError> {
        let clips = assets
            .iter()
            .map(|asset| self.create_audio_clip(asset))
            .collect::<Result<Vec<_>, _>>()?;

        self.render_clips(assets, &clips, output_file)
    }

    /// Mix already built clips and write the result.
    ///
    /// `assets` and `clips` are paired by position.
    pub fn render_clips<P: AsRef<Path>>(
        &self,
        assets: &[AudioAsset],
        clips: &[AudioClip],
        output_file: P,
    ) -> Result<RenderReport, FactoryError> {
        let output_file = output_file.as_ref();
        let mixed = self.merge_audio_clips(clips)?.ok_or(FactoryError::NoClips)?;

        self.save_audio_clip(&mixed, output_file, None)?;

        let summaries = assets
            .iter()
            .zip(clips)
            .map(|(asset, clip)| ClipSummary {
                source: asset.parameters.url.clone(),
                start: clip.start,
                duration: clip.duration(),
                peak: clip.max_volume(),
                actions: asset
                    .actions
                    .iter()
                    .filter_map(|a| a.resolve().ok().flatten())
                    .map(|k| k.to_string())
                    .collect(),
            })
            .collect();

        Ok(RenderReport {
            output_path: output_file.display().to_string(),
            sample_rate: self.config.output_sample_rate,
            channels: mixed.channels,
            duration: mixed.duration(),
            clips: summaries,
        })
    }
}

impl Default for AudioClipFactory {
    fn default() -> Self {
        Self::new(FactoryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(duration: f64, amplitude: f32, rate: u32) -> AudioClip {
        let frames = (duration * rate as f64) as usize;
        let samples = (0..frames)
            .map(|i| amplitude * (i as f32 * 0.05).sin())
            .collect();
        AudioClip::new(samples, 1, rate)
    }

    #[test]
    fn test_loop_background_music_levels_loud_input() {
        let factory = AudioClipFactory::default();
        let clip = tone(2.0, 0.9, 8000);

        let out = factory.loop_background_music(&clip, 5.0).unwrap();
        assert!((out.duration() - 5.0).abs() < 1e-9);
        let peak = out.max_volume() as f64;
        assert!(peak <= 0.3 && peak >= 0.1, "peak {}", peak);
    }

    #[test]
    fn test_loop_background_music_levels_quiet_input() {
        let factory = AudioClipFactory::default();
        let clip = tone(1.0, 0.02, 8000);

        let out = factory.loop_background_music(&clip, 3.0).unwrap();
        let peak = out.max_volume() as f64;
        assert!(peak <= 0.3 && peak >= 0.1, "peak {}", peak);
    }

    #[test]
    fn test_loop_background_music_drops_lead_in() {
        let factory = AudioClipFactory::default();
        // Peak stays inside the window, so only the trim changes samples
        let samples: Vec<f32> = (0..100).map(|i| 0.2 + i as f32 * 0.0005).collect();
        let clip = AudioClip::new(samples.clone(), 1, 100);

        let out = factory.loop_background_music(&clip, 0.5).unwrap();
        assert_eq!(out.samples[0], samples[15]);
    }

    #[test]
    fn test_loop_background_music_silence() {
        let factory = AudioClipFactory::default();
        let clip = AudioClip::silence(1.0, 2, 8000);
        let out = factory.loop_background_music(&clip, 2.0).unwrap();
        assert_eq!(out.max_volume(), 0.0);
        assert!((out.duration() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_apply_audio_effects_in_order() {
        let factory = AudioClipFactory::default();
        let clip = AudioClip::new(vec![0.25, -0.5], 1, 10);
        let actions = vec![
            Action {
                kind: "normalize_music".into(),
                param: None,
            },
            Action {
                kind: "fade_in".into(),
                param: Some(1.0),
            },
            Action {
                kind: "volume_percentage".into(),
                param: Some(0.5),
            },
        ];

        let out = factory.apply_audio_effects(clip, &actions).unwrap();
        assert_eq!(out.samples, vec![0.25, -0.5]);
    }

    #[test]
    fn test_merge_empty_is_none() {
        let factory = AudioClipFactory::default();
        assert!(factory.merge_audio_clips(&[]).unwrap().is_none());
    }

    #[test]
    fn test_merge_sums_on_timeline() {
        let factory = AudioClipFactory::default();
        let a = AudioClip::new(vec![0.1; 10], 1, 10);
        let b = AudioClip::new(vec![0.2, 0.2, 0.4, 0.4], 2, 10).with_start(1.5);

        let mixed = factory.merge_audio_clips(&[a, b]).unwrap().unwrap();
        assert_eq!(mixed.channels, 2);
        assert_eq!(mixed.sample_rate, 10);
        assert!((mixed.duration() - 1.7).abs() < 1e-9);
        // a alone, upmixed
        assert!((mixed.samples[0] - 0.1).abs() < 1e-6);
        // only b after a ends
        assert!((mixed.samples[15 * 2] - 0.2).abs() < 1e-6);
        assert!((mixed.samples[16 * 2 + 1] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_merge_aligns_resampled_clip() {
        let factory = AudioClipFactory::default();

        let mut fast = vec![0.0f32; 44100];
        fast[22050] = 0.5;
        let mut slow = vec![0.0f32; 22050];
        slow[11025] = 0.5;

        let mixed = factory
            .merge_audio_clips(&[
                AudioClip::new(fast, 1, 44100),
                AudioClip::new(slow, 1, 22050),
            ])
            .unwrap()
            .unwrap();

        assert_eq!(mixed.frames(), 44100);
        // Both impulses land on the same frame and add up
        let (at, peak) = mixed
            .samples
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |best, (i, s)| if s.abs() > best.1 { (i, s.abs()) } else { best });
        assert!((at as i64 - 22050).abs() <= 1, "peak at {}", at);
        assert!(peak > 0.75, "peak {}", peak);
    }

    #[test]
    fn test_render_summary_lists_known_actions_only() {
        let factory = AudioClipFactory::default();
        let asset = AudioAsset::from_url("tone.wav")
            .with_action("fade_in", Some(1.0))
            .with_action("volume_percentage", Some(0.5));
        let clip = AudioClip::new(vec![0.25; 441], 1, 44100);
        let out = std::env::temp_dir().join(format!(
            "audioclip-factory-summary-{}.wav",
            std::process::id()
        ));

        let report = factory.render_clips(&[asset], &[clip], &out).unwrap();
        assert_eq!(report.clips[0].actions, vec!["volume_percentage(0.5)".to_string()]);

        std::fs::remove_file(&out).ok();
    }

    #[test]
    fn test_render_without_assets_fails() {
        let factory = AudioClipFactory::default();
        let out = std::env::temp_dir().join("audioclip-factory-empty.wav");
        assert!(matches!(
            factory.render(&[], &out),
            Err(FactoryError::NoClips)
        ));
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: FactoryConfig = serde_json::from_str(r#"{ "output_sample_rate": 48000 }"#).unwrap();
        assert_eq!(config.output_sample_rate, 48000);
        assert_eq!(config.output_bits_per_sample, 16);
        assert_eq!(config.max_leveling_iterations, 16);
    }
}
