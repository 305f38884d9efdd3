//! Preset configurations
//!
//! Presets provide complete default engine policies for common use cases.

use serde::{Deserialize, Serialize};

/// Configuration preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Only the core rule set; no policy-gated checks, generous limits
    Permissive,

    /// Core rule set with exact-arity overload preference
    Standard,

    /// Everything in Standard plus indeterminate-read flagging and tight limits
    Strict,

    /// Minimal defaults meant to be overridden from YAML or the builder API
    Custom,
}

impl Preset {
    /// Parse preset from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "standard" => Ok(Self::Standard),
            "strict" => Ok(Self::Strict),
            "custom" => Ok(Self::Custom),
            _ => Err(format!(
                "Unknown preset '{}'. Valid presets: permissive, standard, strict, custom",
                s
            )),
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permissive => "permissive",
            Self::Standard => "standard",
            Self::Strict => "strict",
            Self::Custom => "custom",
        }
    }
}

impl Default for Preset {
    fn default() -> Self {
        Self::Standard
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
