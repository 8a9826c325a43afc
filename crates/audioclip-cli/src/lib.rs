//! # audioclip-factory
//!
//! Command-line front end for the audio clip factory.
//!
//! ## Commands
//! - `info` - Print file information as JSON
//! - `clip` - Build one clip from flags and save it
//! - `render` - Build every asset in a JSON file, mix and save

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use audioclip_core::{
    AssetList, AudioAsset, AudioClipFactory, AudioProcessor, Exporter, FactoryConfig,
    MarkerFormat,
};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

/// Build, process and mix audio clips
#[derive(Parser, Debug)]
#[command(name = "audioclip-factory")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Factory settings (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print audio file information as JSON
    Info {
        /// Audio file
        path: PathBuf,
    },

    /// Build a single clip and save it as WAV
    Clip {
        /// Audio file
        path: PathBuf,

        /// Cut start (seconds, negative counts from the end)
        #[arg(long, allow_hyphen_values = true)]
        start: Option<f64>,

        /// Cut end (seconds, negative counts from the end)
        #[arg(long, allow_hyphen_values = true)]
        end: Option<f64>,

        /// Volume factor
        #[arg(long)]
        volume: Option<f64>,

        /// Normalize the peak to full scale
        #[arg(long)]
        normalize: bool,

        /// Loop as background music to this many seconds
        #[arg(long = "loop", value_name = "SECS")]
        loop_secs: Option<f64>,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Build every asset in a JSON file, mix them and save as WAV
    Render {
        /// Asset file (one asset or an array)
        assets: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Write a JSON report here
        #[arg(long)]
        report: Option<PathBuf>,

        /// Write clip markers here (.csv, anything else is an Audacity label file)
        #[arg(long)]
        markers: Option<PathBuf>,
    },
}

/// Set up logging to stderr, keeping any subscriber already installed
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Execute the CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => FactoryConfig::from_path(path)
            .with_context(|| format!("Cannot read config {}", path.display()))?,
        None => FactoryConfig::default(),
    };
    let factory = AudioClipFactory::new(config);

    match cli.command {
        Commands::Info { path } => {
            let info = AudioProcessor::new()
                .get_info(&path)
                .with_context(|| format!("Cannot read {}", path.display()))?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Clip {
            path,
            start,
            end,
            volume,
            normalize,
            loop_secs,
            output,
        } => {
            let asset = clip_asset(&path, start, end, volume, normalize, loop_secs);
            let clip = factory
                .create_audio_clip(&asset)
                .with_context(|| format!("Cannot build clip from {}", path.display()))?;
            factory
                .save_audio_clip(&clip, &output, None)
                .with_context(|| format!("Cannot write {}", output.display()))?;
            info!("Wrote {:.3}s to {}", clip.duration(), output.display());
        }

        Commands::Render {
            assets,
            output,
            report,
            markers,
        } => {
            let assets = AssetList::from_path(&assets)
                .with_context(|| format!("Cannot read assets {}", assets.display()))?;
            render(factory, assets, &output, report.as_deref(), markers.as_deref()).await?;
        }
    }

    Ok(())
}

/// Build an asset from `clip` flags
pub fn clip_asset(
    path: &Path,
    start: Option<f64>,
    end: Option<f64>,
    volume: Option<f64>,
    normalize: bool,
    loop_secs: Option<f64>,
) -> AudioAsset {
    let mut asset = AudioAsset::from_url(path.display().to_string());
    asset.parameters.start = start;
    asset.parameters.end = end;
    asset.parameters.volume = volume;

    if normalize {
        asset = asset.with_action("normalize_music", None);
    }
    if let Some(secs) = loop_secs {
        asset = asset.with_action("loop_background_music", Some(secs));
    }
    asset
}

async fn render(
    factory: AudioClipFactory,
    assets: Vec<AudioAsset>,
    output: &Path,
    report_path: Option<&Path>,
    markers_path: Option<&Path>,
) -> Result<()> {
    let factory = Arc::new(factory);

    // Decode and process every asset on its own blocking task
    let tasks = assets.iter().cloned().map(|asset| {
        let factory = Arc::clone(&factory);
        tokio::task::spawn_blocking(move || factory.create_audio_clip(&asset))
    });
    let clips = futures::future::try_join_all(tasks)
        .await
        .context("Clip task failed")?
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    let report = tokio::task::spawn_blocking({
        let factory = Arc::clone(&factory);
        let output = output.to_path_buf();
        move || factory.render_clips(&assets, &clips, &output)
    })
    .await
    .context("Render task failed")?
    .with_context(|| format!("Cannot render {}", output.display()))?;

    info!(
        "Rendered {} clips, {:.3}s, to {}",
        report.clips.len(),
        report.duration,
        output.display()
    );

    if let Some(path) = report_path {
        Exporter::to_json(&report, path, true)
            .with_context(|| format!("Cannot write report {}", path.display()))?;
    }

    if let Some(path) = markers_path {
        Exporter::to_markers(&report, path, marker_format(path))
            .with_context(|| format!("Cannot write markers {}", path.display()))?;
    }

    Ok(())
}

fn marker_format(path: &Path) -> MarkerFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => MarkerFormat::Csv,
        _ => MarkerFormat::Audacity,
    }
}
