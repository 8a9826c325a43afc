//! audioclip-core - audio clip factory
//!
//! Decodes audio files into clips, runs asset actions on them (normalize,
//! loop with volume levelling, volume), mixes clips onto a timeline and
//! writes the result as WAV.

pub mod asset;
pub mod audio;
pub mod clip;
pub mod effects;
pub mod exporter;
pub mod factory;
pub mod types;

pub use asset::{Action, ActionKind, AssetList, AssetParameters, AudioAsset};
pub use audio::{AudioError, AudioProcessor};
pub use clip::{AudioClip, ClipError};
pub use effects::AudioEffect;
pub use exporter::{ExportError, Exporter, MarkerFormat};
pub use factory::{AudioClipFactory, FactoryConfig, FactoryError};
pub use types::*;
