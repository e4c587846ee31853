// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration system for KEYLOOP.
//!
//! This module provides data structures for loading and validating the
//! keyboard layout and the loop timing constants from YAML.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Problems found by [`AppConfig::validate`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("keyboard has no keys")]
    NoKeys,
    #[error("note {0:?} is defined more than once")]
    DuplicateNote(String),
    #[error("hint {hint:?} is used by both {first:?} and {second:?}")]
    DuplicateHint {
        hint: String,
        first: String,
        second: String,
    },
    #[error("note {note:?} has invalid frequency {frequency}")]
    InvalidFrequency { note: String, frequency: f64 },
    #[error("note {0:?} has an empty hint")]
    EmptyHint(String),
    #[error("loop gap must be greater than zero")]
    ZeroGap,
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Loop playback timing
    #[serde(default, rename = "loop")]
    pub loop_timing: LoopConfig,
    /// Keyboard layout, lowest key first
    #[serde(default = "default_keys")]
    pub keys: Vec<KeyConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            loop_timing: LoopConfig::default(),
            keys: default_keys(),
        }
    }
}

impl AppConfig {
    /// Load and validate a configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config = Self::from_yaml(&contents)?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Parse a configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration to YAML")
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))
    }

    /// Check the layout and timing for errors.
    ///
    /// A gap shorter than the fade is allowed but logged, since the last
    /// note of a cycle may still be fading when the next cycle starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loop_timing.gap_ms == 0 {
            return Err(ConfigError::ZeroGap);
        }
        if self.keys.is_empty() {
            return Err(ConfigError::NoKeys);
        }

        let mut notes = HashSet::new();
        let mut hints: Vec<(String, &str)> = Vec::new();
        for key in &self.keys {
            if !key.frequency.is_finite() || key.frequency <= 0.0 {
                return Err(ConfigError::InvalidFrequency {
                    note: key.name.clone(),
                    frequency: key.frequency,
                });
            }
            if key.hint.is_empty() {
                return Err(ConfigError::EmptyHint(key.name.clone()));
            }
            if !notes.insert(key.name.as_str()) {
                return Err(ConfigError::DuplicateNote(key.name.clone()));
            }

            let hint = key.hint.to_lowercase();
            if let Some((_, first)) = hints.iter().find(|(h, _)| *h == hint) {
                return Err(ConfigError::DuplicateHint {
                    hint,
                    first: first.to_string(),
                    second: key.name.clone(),
                });
            }
            hints.push((hint, key.name.as_str()));
        }

        if self.loop_timing.restart_overlaps_fade() {
            warn!(
                gap_ms = self.loop_timing.gap_ms,
                fade_ms = self.loop_timing.fade_ms,
                "loop gap is shorter than the note fade; cycle restarts may overlap"
            );
        }

        Ok(())
    }
}

/// Loop timing constants
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoopConfig {
    /// Pause after the last event of a cycle before the next cycle starts
    #[serde(default = "default_gap_ms")]
    pub gap_ms: u64,
    /// Fade-out length of a released note, as applied by the tone layer
    #[serde(default = "default_fade_ms")]
    pub fade_ms: u64,
}

fn default_gap_ms() -> u64 {
    100
}
fn default_fade_ms() -> u64 {
    300
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            gap_ms: default_gap_ms(),
            fade_ms: default_fade_ms(),
        }
    }
}

impl LoopConfig {
    pub fn gap(&self) -> Duration {
        Duration::from_millis(self.gap_ms)
    }

    /// True when a note released at the very end of a cycle is still fading
    /// as the next cycle begins
    pub fn restart_overlaps_fade(&self) -> bool {
        self.gap_ms < self.fade_ms
    }
}

/// One key of the keyboard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyConfig {
    /// Note name (e.g. "C#4")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f64,
    /// Computer key that plays this note
    pub hint: String,
}

impl KeyConfig {
    pub fn new(name: impl Into<String>, frequency: f64, hint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frequency,
            hint: hint.into(),
        }
    }

    /// Black keys carry a sharp in their name
    pub fn is_sharp(&self) -> bool {
        self.name.contains('#')
    }

    /// Case-insensitive match against a typed character
    pub fn matches_hint(&self, c: char) -> bool {
        let mut chars = self.hint.chars();
        match (chars.next(), chars.next()) {
            (Some(hint), None) => hint.to_lowercase().eq(c.to_lowercase()),
            _ => false,
        }
    }
}

/// Twenty keys from C4 to G5 on the home and top rows
pub fn default_keys() -> Vec<KeyConfig> {
    [
        ("C4", 261.63, "a"),
        ("C#4", 277.18, "w"),
        ("D4", 293.66, "s"),
        ("D#4", 311.13, "e"),
        ("E4", 329.63, "d"),
        ("F4", 349.23, "f"),
        ("F#4", 369.99, "t"),
        ("G4", 392.0, "g"),
        ("G#4", 415.3, "y"),
        ("A4", 440.0, "h"),
        ("A#4", 466.16, "u"),
        ("B4", 493.88, "j"),
        ("C5", 523.25, "k"),
        ("C#5", 554.37, "o"),
        ("D5", 587.33, "l"),
        ("D#5", 622.25, "p"),
        ("E5", 659.26, ";"),
        ("F5", 698.46, "'"),
        ("F#5", 739.99, "]"),
        ("G5", 783.99, "\\"),
    ]
    .into_iter()
    .map(|(name, frequency, hint)| KeyConfig::new(name, frequency, hint))
    .collect()
}
