//! Asset descriptions
//!
//! An asset names an audio source and the actions to run on it:
//!
//! ```json
//! { "parameters": { "url": "music.mp3", "start": 1.0, "end": 9.0 },
//!   "actions": [ { "type": "loop_background_music", "param": 30.0 } ] }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::factory::FactoryError;

/// Source parameters of an asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetParameters {
    /// File path of the audio source
    pub url: String,
    /// Cut start within the source (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    /// Cut end within the source (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    /// Volume factor applied before actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    /// Timeline start when mixed (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
}

/// One asset: a source plus actions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioAsset {
    pub parameters: AssetParameters,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl AudioAsset {
    /// Asset for a plain file with no actions
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            parameters: AssetParameters {
                url: url.into(),
                ..Default::default()
            },
            actions: Vec::new(),
        }
    }

    /// Append an action
    pub fn with_action(mut self, kind: &str, param: Option<f64>) -> Self {
        self.actions.push(Action {
            kind: kind.to_string(),
            param,
        });
        self
    }
}

/// Action as written in the asset file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<f64>,
}

/// Recognised actions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionKind {
    /// Normalize the peak to full scale
    NormalizeMusic,
    /// Loop to a target duration (seconds) and level the volume
    LoopBackgroundMusic(f64),
    /// Multiply the volume by a factor
    VolumePercentage(f64),
}

impl Action {
    /// Map the action to a known kind, `None` for unknown types.
    ///
    /// Pure lookup, callers decide whether an unknown type is worth a warning.
    pub fn resolve(&self) -> Result<Option<ActionKind>, FactoryError> {
        let kind = match self.kind.as_str() {
            "normalize_music" => ActionKind::NormalizeMusic,
            "loop_background_music" => match self.param {
                Some(duration) if duration > 0.0 && duration.is_finite() => {
                    ActionKind::LoopBackgroundMusic(duration)
                }
                _ => {
                    return Err(FactoryError::InvalidAction(format!(
                        "loop_background_music needs a positive duration, got {:?}",
                        self.param
                    )))
                }
            },
            "volume_percentage" => match self.param {
                Some(factor) if factor.is_finite() => ActionKind::VolumePercentage(factor),
                _ => {
                    return Err(FactoryError::InvalidAction(format!(
                        "volume_percentage needs a factor, got {:?}",
                        self.param
                    )))
                }
            },
            _ => return Ok(None),
        };

        Ok(Some(kind))
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::NormalizeMusic => write!(f, "normalize_music"),
            ActionKind::LoopBackgroundMusic(d) => write!(f, "loop_background_music({})", d),
            ActionKind::VolumePercentage(p) => write!(f, "volume_percentage({})", p),
        }
    }
}

/// Assets read from a file holding one asset or an array of them
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AssetList {
    Many(Vec<AudioAsset>),
    One(AudioAsset),
}

impl AssetList {
    /// Parse from JSON text
    pub fn from_json(json: &str) -> Result<Vec<AudioAsset>, FactoryError> {
        let list: AssetList = serde_json::from_str(json)?;
        Ok(list.into_assets())
    }

    /// Read and parse a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<AudioAsset>, FactoryError> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn into_assets(self) -> Vec<AudioAsset> {
        match self {
            AssetList::Many(assets) => assets,
            AssetList::One(asset) => vec![asset],
        }
    }
}
