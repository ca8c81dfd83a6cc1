use crate::persistent::CallState;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FuncConfig {
    /// Call state given to listeners added without an explicit one.
    #[serde(default = "FuncConfig::default_call_state")]
    pub default_call_state: CallState,
    /// Log persistent listeners that fail to resolve during a rebuild.
    #[serde(default = "FuncConfig::default_warn_unresolved")]
    pub warn_unresolved: bool,
}

impl FuncConfig {
    fn default_call_state() -> CallState {
        CallState::RuntimeOnly
    }

    const fn default_warn_unresolved() -> bool {
        true
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Failed to read func config {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse func config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("Func config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }
}

impl Default for FuncConfig {
    fn default() -> Self {
        Self { default_call_state: Self::default_call_state(), warn_unresolved: Self::default_warn_unresolved() }
    }
}
