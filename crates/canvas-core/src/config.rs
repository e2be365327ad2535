//! Engine configuration
//!
//! [`CanvasConfig`] carries the debounce period, reveal windows and the
//! session user. It deserializes from TOML; every field has a default.

use crate::error::CanvasError;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;
use std::time::Duration;

/// Half-open `[start, end)` window on accumulated content length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealWindow {
    pub start: usize,
    pub end: usize,
}

impl RevealWindow {
    #[inline]
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, len: usize) -> bool {
        self.as_range().contains(&len)
    }

    #[inline]
    #[must_use]
    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Canvas configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Quiet period before a debounced save fires
    pub save_debounce_ms: u64,
    /// Length window that reveals a streaming text artifact
    pub text_reveal: RevealWindow,
    /// Length window that reveals a streaming code artifact
    pub code_reveal: RevealWindow,
    /// Session user; `None` for unauthenticated previews
    pub user_id: Option<String>,
}

impl CanvasConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With session user
    #[inline]
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// With debounce quiet period
    #[inline]
    #[must_use]
    pub fn with_save_debounce(mut self, period: Duration) -> Self {
        self.save_debounce_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[inline]
    #[must_use]
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns `CanvasError::Config` on malformed input
    pub fn from_toml_str(raw: &str) -> Result<Self, CanvasError> {
        let config: Self = toml::from_str(raw).map_err(|e| CanvasError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns `CanvasError::Config` if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CanvasError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CanvasError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    fn validate(&self) -> Result<(), CanvasError> {
        for (name, window) in [("text_reveal", self.text_reveal), ("code_reveal", self.code_reveal)] {
            if window.start >= window.end {
                return Err(CanvasError::Config(format!(
                    "{name} window is empty: [{}, {})",
                    window.start, window.end
                )));
            }
        }
        Ok(())
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: 2000,
            text_reveal: RevealWindow::new(400, 450),
            code_reveal: RevealWindow::new(300, 310),
            user_id: None,
        }
    }
}
