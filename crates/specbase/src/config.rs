//! Context configuration
//!
//! Controls how a [`SpecBase`](crate::SpecBase) exposes resources and drives
//! frames. Loadable from TOML:
//!
//! ```toml
//! [context]
//! expose_attributes = true   # false = "debased": registry only, no attributes
//! task_manager = true        # run() drives tasks instead of bare frames
//! missing_keep = "ignore"    # ignore, error
//! max_frames = 120           # stop run() after this many frames
//! ```

use crate::error::SpecResult;
use crate::reconcile::MissingKeepPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Expose `add_to_base` resources in the attribute namespace
    pub expose_attributes: bool,
    /// Drive `run()` through the task manager
    pub task_manager: bool,
    /// Handling of Keep-markers for unregistered names
    pub missing_keep: MissingKeepPolicy,
    /// Frame budget for `run()`; unbounded when unset
    pub max_frames: Option<u64>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            expose_attributes: true,
            task_manager: true,
            missing_keep: MissingKeepPolicy::Ignore,
            max_frames: None,
        }
    }
}

/// Raw TOML structure: everything lives under `[context]`
#[derive(Debug, Default, Deserialize)]
struct ConfigToml {
    #[serde(default)]
    context: ContextConfig,
}

impl ContextConfig {
    /// Registry-only configuration: nothing is exposed as an attribute
    pub fn debased() -> Self {
        Self {
            expose_attributes: false,
            ..Default::default()
        }
    }

    pub fn with_max_frames(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    pub fn with_missing_keep(mut self, policy: MissingKeepPolicy) -> Self {
        self.missing_keep = policy;
        self
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> SpecResult<Self> {
        let raw: ConfigToml = toml::from_str(content)?;
        Ok(raw.context)
    }

    /// Load configuration from a file
    pub fn load(path: impl AsRef<Path>) -> SpecResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
