//! Artifact kinds
//!
//! Defines the closed [`ArtifactKind`] set and [`KindTable`], the per-kind
//! lookup table used wherever something must exist for every kind.

use crate::content::ArtifactContent;
use crate::error::ArtifactError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of an artifact
///
/// The kind fully determines the content representation: rich text holds a
/// structured tree, every other kind an opaque string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Plain prose
    #[serde(alias = "text")]
    PlainText,
    /// Rich text backed by a document tree
    RichText,
    /// Source code
    Code,
    /// Image reference (URL or base64 payload)
    Image,
    /// Tabular data (CSV)
    #[serde(alias = "sheet")]
    Tabular,
}

/// Content representation used by a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    /// Opaque string
    Opaque,
    /// Structured document tree
    Structured,
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opaque => write!(f, "opaque"),
            Self::Structured => write!(f, "structured"),
        }
    }
}

impl ArtifactKind {
    /// Every kind, in declaration order
    pub const ALL: [ArtifactKind; 5] = [
        Self::PlainText,
        Self::RichText,
        Self::Code,
        Self::Image,
        Self::Tabular,
    ];

    /// Stable wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlainText => "plain-text",
            Self::RichText => "rich-text",
            Self::Code => "code",
            Self::Image => "image",
            Self::Tabular => "tabular",
        }
    }

    /// Content representation for this kind
    #[inline]
    #[must_use]
    pub fn representation(self) -> Representation {
        match self {
            Self::RichText => Representation::Structured,
            Self::PlainText | Self::Code | Self::Image | Self::Tabular => Representation::Opaque,
        }
    }

    /// Whether content is a structured tree
    #[inline]
    #[must_use]
    pub fn is_structured(self) -> bool {
        self.representation() == Representation::Structured
    }

    /// Default content for a freshly opened artifact of this kind
    #[inline]
    #[must_use]
    pub fn default_content(self) -> ArtifactContent {
        match self.representation() {
            Representation::Opaque => ArtifactContent::empty_text(),
            Representation::Structured => ArtifactContent::empty_tree(),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain-text" | "text" => Ok(Self::PlainText),
            "rich-text" => Ok(Self::RichText),
            "code" => Ok(Self::Code),
            "image" => Ok(Self::Image),
            "tabular" | "sheet" => Ok(Self::Tabular),
            other => Err(ArtifactError::UnknownKind(other.to_string())),
        }
    }
}

/// One value per artifact kind
///
/// Construction requires every field, so adding a kind breaks every table
/// until the new slot is filled.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KindTable<T> {
    pub plain_text: T,
    pub rich_text: T,
    pub code: T,
    pub image: T,
    pub tabular: T,
}

impl<T> KindTable<T> {
    /// Build a table by evaluating `f` for every kind
    pub fn from_fn(mut f: impl FnMut(ArtifactKind) -> T) -> Self {
        Self {
            plain_text: f(ArtifactKind::PlainText),
            rich_text: f(ArtifactKind::RichText),
            code: f(ArtifactKind::Code),
            image: f(ArtifactKind::Image),
            tabular: f(ArtifactKind::Tabular),
        }
    }

    /// Value for a kind
    #[inline]
    #[must_use]
    pub fn get(&self, kind: ArtifactKind) -> &T {
        match kind {
            ArtifactKind::PlainText => &self.plain_text,
            ArtifactKind::RichText => &self.rich_text,
            ArtifactKind::Code => &self.code,
            ArtifactKind::Image => &self.image,
            ArtifactKind::Tabular => &self.tabular,
        }
    }

    /// Mutable value for a kind
    #[inline]
    pub fn get_mut(&mut self, kind: ArtifactKind) -> &mut T {
        match kind {
            ArtifactKind::PlainText => &mut self.plain_text,
            ArtifactKind::RichText => &mut self.rich_text,
            ArtifactKind::Code => &mut self.code,
            ArtifactKind::Image => &mut self.image,
            ArtifactKind::Tabular => &mut self.tabular,
        }
    }

    /// Transform every slot
    pub fn map<U>(self, mut f: impl FnMut(ArtifactKind, T) -> U) -> KindTable<U> {
        KindTable {
            plain_text: f(ArtifactKind::PlainText, self.plain_text),
            rich_text: f(ArtifactKind::RichText, self.rich_text),
            code: f(ArtifactKind::Code, self.code),
            image: f(ArtifactKind::Image, self.image),
            tabular: f(ArtifactKind::Tabular, self.tabular),
        }
    }

    /// Iterate `(kind, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (ArtifactKind, &T)> {
        ArtifactKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rich_text_is_structured() {
        for kind in ArtifactKind::ALL {
            assert_eq!(kind.is_structured(), kind == ArtifactKind::RichText);
        }
    }

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!("text".parse::<ArtifactKind>().unwrap(), ArtifactKind::PlainText);
        assert_eq!("sheet".parse::<ArtifactKind>().unwrap(), ArtifactKind::Tabular);
        assert_eq!("rich-text".parse::<ArtifactKind>().unwrap(), ArtifactKind::RichText);
    }

    #[test]
    fn parse_rejects_unknown() {
        let err = "spreadsheet".parse::<ArtifactKind>().unwrap_err();
        assert_eq!(err, ArtifactError::UnknownKind("spreadsheet".to_string()));
    }

    #[test]
    fn display_roundtrips_through_parse() {
        for kind in ArtifactKind::ALL {
            assert_eq!(kind.to_string().parse::<ArtifactKind>().unwrap(), kind);
        }
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&ArtifactKind::RichText).unwrap();
        assert_eq!(json, "\"rich-text\"");
        let parsed: ArtifactKind = serde_json::from_str("\"sheet\"").unwrap();
        assert_eq!(parsed, ArtifactKind::Tabular);
    }

    #[test]
    fn kind_table_lookup_and_map() {
        let table = KindTable::from_fn(|kind| kind.as_str().len());
        assert_eq!(*table.get(ArtifactKind::Code), 4);

        let doubled = table.map(|_, len| len * 2);
        assert_eq!(*doubled.get(ArtifactKind::Image), 10);
        assert_eq!(doubled.iter().count(), 5);
    }
}
