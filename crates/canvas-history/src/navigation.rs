//! Version navigation actions and display modes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a non-live version is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Regular editor view
    #[default]
    Edit,
    /// Side-by-side comparison with the previous version
    Diff,
}

impl DisplayMode {
    #[inline]
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Edit => Self::Diff,
            Self::Diff => Self::Edit,
        }
    }
}

/// Navigation request from a version footer or toolbar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionAction {
    /// Jump to the newest version and leave diff mode
    Latest,
    /// Flip between edit and diff display
    Toggle,
    /// Step to the previous version
    Prev,
    /// Step to the next version
    Next,
}

impl fmt::Display for VersionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Latest => "latest",
            Self::Toggle => "toggle",
            Self::Prev => "prev",
            Self::Next => "next",
        };
        f.write_str(name)
    }
}

/// Unrecognised navigation action name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown version action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for VersionAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(Self::Latest),
            "toggle" => Ok(Self::Toggle),
            "prev" => Ok(Self::Prev),
            "next" => Ok(Self::Next),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}
