//! Engine configuration
//!
//! Three levels, from simplest to most complete:
//! - Preset: `EngineConfig::from_preset(Preset::Strict)`
//! - Builder/patch: `EngineConfig::from_preset(p).max_frames(64)` or `apply_patch`
//! - YAML file with a versioned envelope:
//!
//! ```yaml
//! version: 1
//! preset: strict
//! overrides:
//!   max_frames: 64
//! ```

use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use super::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::path::Path;

const SUPPORTED_VERSIONS: &[u32] = &[1];

/// Policy and limits for one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Preset these values were derived from
    pub preset: Preset,

    /// Report `IndeterminateRead` when a never-written binding is read
    pub flag_indeterminate_reads: bool,

    /// Prefer exact-arity overloads over ones that need default fill-in.
    /// When off, both tiers compete and a tie is `OverloadAmbiguous`.
    pub prefer_exact_arity: bool,

    /// Maximum live stack frames (1..=100000)
    pub max_frames: usize,

    /// Maximum heap allocations per run, released ones included (1..=1000000)
    pub max_heap_objects: usize,

    /// Keep every executed operation so the run can be exported as a trace.
    /// Off in every preset; the record grows with each operation.
    pub record_trace: bool,
}

impl EngineConfig {
    /// Field names accepted under `overrides` in YAML
    pub const FIELD_NAMES: &'static [&'static str] = &[
        "flag_indeterminate_reads",
        "prefer_exact_arity",
        "max_frames",
        "max_heap_objects",
        "record_trace",
    ];

    /// Create from preset
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Permissive => Self {
                preset,
                flag_indeterminate_reads: false,
                prefer_exact_arity: true,
                max_frames: 100_000,
                max_heap_objects: 1_000_000,
                record_trace: false,
            },
            Preset::Standard => Self {
                preset,
                flag_indeterminate_reads: false,
                prefer_exact_arity: true,
                max_frames: 10_000,
                max_heap_objects: 100_000,
                record_trace: false,
            },
            Preset::Strict => Self {
                preset,
                flag_indeterminate_reads: true,
                prefer_exact_arity: true,
                max_frames: 1_000,
                max_heap_objects: 10_000,
                record_trace: false,
            },
            Preset::Custom => Self {
                preset,
                flag_indeterminate_reads: false,
                prefer_exact_arity: true,
                max_frames: 10_000,
                max_heap_objects: 100_000,
                record_trace: false,
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_frames == 0 || self.max_frames > 100_000 {
            return Err(ConfigError::range_with_hint(
                "max_frames",
                self.max_frames,
                1,
                100_000,
                "Stack depth limit must allow at least one frame",
            ));
        }

        if self.max_heap_objects == 0 || self.max_heap_objects > 1_000_000 {
            return Err(ConfigError::range_with_hint(
                "max_heap_objects",
                self.max_heap_objects,
                1,
                1_000_000,
                "Heap object limit must be reasonable",
            ));
        }

        Ok(())
    }

    /// Builder: Set flag_indeterminate_reads
    pub fn flag_indeterminate_reads(mut self, v: bool) -> Self {
        self.flag_indeterminate_reads = v;
        self
    }

    /// Builder: Set prefer_exact_arity
    pub fn prefer_exact_arity(mut self, v: bool) -> Self {
        self.prefer_exact_arity = v;
        self
    }

    /// Builder: Set max_frames
    pub fn max_frames(mut self, v: usize) -> Self {
        self.max_frames = v;
        self
    }

    /// Builder: Set max_heap_objects
    pub fn max_heap_objects(mut self, v: usize) -> Self {
        self.max_heap_objects = v;
        self
    }

    /// Builder: Set record_trace
    pub fn record_trace(mut self, v: bool) -> Self {
        self.record_trace = v;
        self
    }

    /// Apply a partial override on top of the current values
    pub fn apply_patch(mut self, patch: EngineConfigPatch) -> Self {
        if let Some(v) = patch.flag_indeterminate_reads {
            self.flag_indeterminate_reads = v;
        }
        if let Some(v) = patch.prefer_exact_arity {
            self.prefer_exact_arity = v;
        }
        if let Some(v) = patch.max_frames {
            self.max_frames = v;
        }
        if let Some(v) = patch.max_heap_objects {
            self.max_heap_objects = v;
        }
        if let Some(v) = patch.record_trace {
            self.record_trace = v;
        }
        self
    }

    /// Load and validate a YAML configuration file
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate YAML configuration text
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let raw: serde_yaml::Value = serde_yaml::from_str(content)?;
        check_unknown_fields(&raw)?;

        let file: ConfigFileV1 = serde_yaml::from_value(raw)?;
        let version = file.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let preset = Preset::from_str(&file.preset)
            .map_err(|_| ConfigError::UnknownPreset(file.preset.clone()))?;

        let mut config = Self::from_preset(preset);
        if let Some(patch) = file.overrides {
            config = config.apply_patch(patch);
        }
        config.validate()?;
        Ok(config)
    }

    /// Export as a versioned YAML document
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let file = ConfigFileV1 {
            version: Some(1),
            preset: self.preset.to_string(),
            overrides: Some(EngineConfigPatch::from(self)),
        };
        Ok(serde_yaml::to_string(&file)?)
    }

    /// Write as a versioned YAML file
    pub fn save_yaml(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Standard)
    }
}

impl Validatable for EngineConfig {
    fn validate(&self) -> ConfigResult<()> {
        EngineConfig::validate(self)
    }

    fn config_name(&self) -> &'static str {
        "EngineConfig"
    }
}

/// Partial override of `EngineConfig`; `None` keeps the preset value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_indeterminate_reads: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefer_exact_arity: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_frames: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_heap_objects: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_trace: Option<bool>,
}

impl From<&EngineConfig> for EngineConfigPatch {
    fn from(config: &EngineConfig) -> Self {
        Self {
            flag_indeterminate_reads: Some(config.flag_indeterminate_reads),
            prefer_exact_arity: Some(config.prefer_exact_arity),
            max_frames: Some(config.max_frames),
            max_heap_objects: Some(config.max_heap_objects),
            record_trace: Some(config.record_trace),
        }
    }
}

/// YAML schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFileV1 {
    version: Option<u32>,
    preset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    overrides: Option<EngineConfigPatch>,
}

fn check_unknown_fields(raw: &serde_yaml::Value) -> ConfigResult<()> {
    let Some(root) = raw.as_mapping() else {
        return Ok(());
    };

    let top_level = ["version", "preset", "overrides"];
    for key in root.keys().filter_map(|k| k.as_str()) {
        if !top_level.contains(&key) {
            return Err(ConfigError::unknown_field_with_suggestion(
                key,
                "root",
                top_level.iter().map(|s| s.to_string()).collect(),
            ));
        }
    }

    if let Some(overrides) = root.get("overrides").and_then(|v| v.as_mapping()) {
        for key in overrides.keys().filter_map(|k| k.as_str()) {
            if !EngineConfig::FIELD_NAMES.contains(&key) {
                return Err(ConfigError::unknown_field_with_suggestion(
                    key,
                    "overrides",
                    EngineConfig::FIELD_NAMES.iter().map(|s| s.to_string()).collect(),
                ));
            }
        }
    }

    Ok(())
}
