//! Shared types

use serde::{Deserialize, Serialize};

/// Audio file information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInfo {
    /// File path
    pub path: String,
    /// Duration in seconds
    pub duration: f64,
    /// Sample rate
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
    /// Bit depth
    pub bits_per_sample: u16,
}

/// Summary of one clip that went into a render
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipSummary {
    /// Source path or URL
    pub source: String,
    /// Timeline start (seconds)
    pub start: f64,
    /// Clip duration (seconds)
    pub duration: f64,
    /// Peak absolute sample value after processing
    pub peak: f32,
    /// Actions applied, in order
    pub actions: Vec<String>,
}

impl ClipSummary {
    /// Timeline end (seconds)
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Result of rendering a set of assets into one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderReport {
    /// Output file path
    pub output_path: String,
    /// Output sample rate
    pub sample_rate: u32,
    /// Output channel count
    pub channels: u16,
    /// Output duration (seconds)
    pub duration: f64,
    /// Clips mixed into the output
    pub clips: Vec<ClipSummary>,
}
