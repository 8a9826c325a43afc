//! Render report export

use std::fs;
use std::path::Path;

use chrono::Local;
use serde::Serialize;
use thiserror::Error;

use crate::types::{ClipSummary, RenderReport};

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes render reports
pub struct Exporter;

impl Exporter {
    /// Write the report as JSON
    pub fn to_json<P: AsRef<Path>>(
        report: &RenderReport,
        output_path: P,
        pretty: bool,
    ) -> Result<(), ExportError> {
        let output_path = output_path.as_ref();
        ensure_parent(output_path)?;

        let data = JsonReport::from_report(report);
        let json = if pretty {
            serde_json::to_string_pretty(&data)?
        } else {
            serde_json::to_string(&data)?
        };

        fs::write(output_path, json)?;
        Ok(())
    }

    /// Write one marker per clip, spanning its place on the timeline
    pub fn to_markers<P: AsRef<Path>>(
        report: &RenderReport,
        output_path: P,
        format: MarkerFormat,
    ) -> Result<(), ExportError> {
        let output_path = output_path.as_ref();
        ensure_parent(output_path)?;

        let content = match format {
            MarkerFormat::Csv => Self::format_markers_csv(&report.clips),
            MarkerFormat::Audacity => Self::format_markers_audacity(&report.clips),
        };

        fs::write(output_path, content)?;
        Ok(())
    }

    fn format_markers_csv(clips: &[ClipSummary]) -> String {
        let mut lines = vec!["start,end,source,actions".to_string()];

        for clip in clips {
            lines.push(format!(
                "{:.3},{:.3},{},{}",
                clip.start,
                clip.end(),
                csv_field(&clip.source),
                csv_field(&clip.actions.join(" "))
            ));
        }

        lines.join("\n")
    }

    fn format_markers_audacity(clips: &[ClipSummary]) -> String {
        clips
            .iter()
            .map(|clip| {
                let label = Path::new(&clip.source)
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or(&clip.source)
                    .replace('\t', " ");
                format!("{:.6}\t{:.6}\t{}", clip.start, clip.end(), label)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Quote a CSV field, doubling embedded quotes
fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn ensure_parent(path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Marker file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerFormat {
    /// CSV
    Csv,
    /// Audacity label track
    Audacity,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    generated_at: String,
    output: &'a str,
    sample_rate: u32,
    channels: u16,
    duration: f64,
    clip_count: usize,
    clips: &'a [ClipSummary],
}

impl<'a> JsonReport<'a> {
    fn from_report(report: &'a RenderReport) -> Self {
        Self {
            version: "1.0",
            generated_at: Local::now().to_rfc3339(),
            output: &report.output_path,
            sample_rate: report.sample_rate,
            channels: report.channels,
            duration: report.duration,
            clip_count: report.clips.len(),
            clips: &report.clips,
        }
    }
}
