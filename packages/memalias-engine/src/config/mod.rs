//! Configuration system
//!
//! Presets for the common cases, builder/patch overrides for adjustments, and
//! versioned YAML files for complete control.
//!
//! ```rust,ignore
//! use memalias_engine::config::{EngineConfig, Preset};
//!
//! let config = EngineConfig::from_preset(Preset::Strict).max_frames(256);
//! let config = EngineConfig::from_yaml("engine.yaml")?;
//! ```

pub mod engine_config;
pub mod error;
pub mod preset;
pub mod validation;

pub use engine_config::{EngineConfig, EngineConfigPatch};
pub use error::{ConfigError, ConfigResult};
pub use preset::Preset;
pub use validation::{ConfigValidator, Validatable};
