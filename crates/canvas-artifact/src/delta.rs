//! Generation delta events
//!
//! Wire shape: `{"type": "<kebab-case name>", "content": <payload>}`. Any
//! unrecognised `type` decodes to [`DeltaEvent::Unknown`] whatever its
//! payload.

use crate::id::DocumentId;
use crate::kind::ArtifactKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Edit suggestion produced alongside a generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    pub document_id: DocumentId,
    pub original_text: String,
    pub suggested_text: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_resolved: bool,
}

/// One incremental unit of a generation stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "content",
    rename_all = "kebab-case",
    try_from = "RawEvent"
)]
pub enum DeltaEvent {
    /// Bind the stream to a document
    SetId(DocumentId),
    SetTitle(String),
    SetKind(ArtifactKind),
    /// Append to string content
    TextDelta(String),
    /// Full code snapshot
    CodeDelta(String),
    /// Full image payload
    ImageDelta(String),
    /// Full CSV snapshot
    SheetDelta(String),
    Suggestion(Suggestion),
    Clear,
    Finish,
    /// Opaque id forwarded to collaborators
    CorrelationId(String),
    /// Any event type this consumer does not know, payload discarded
    Unknown,
}

/// Wire envelope before the tag is resolved
#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    tag: String,
    #[serde(default)]
    content: Value,
}

impl TryFrom<RawEvent> for DeltaEvent {
    type Error = serde_json::Error;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        fn payload<T: DeserializeOwned>(content: Value) -> Result<T, serde_json::Error> {
            serde_json::from_value(content)
        }

        let RawEvent { tag, content } = raw;
        Ok(match tag.as_str() {
            "set-id" => Self::SetId(payload(content)?),
            "set-title" => Self::SetTitle(payload(content)?),
            "set-kind" => Self::SetKind(payload(content)?),
            "text-delta" => Self::TextDelta(payload(content)?),
            "code-delta" => Self::CodeDelta(payload(content)?),
            "image-delta" => Self::ImageDelta(payload(content)?),
            "sheet-delta" => Self::SheetDelta(payload(content)?),
            "suggestion" => Self::Suggestion(payload(content)?),
            "correlation-id" => Self::CorrelationId(payload(content)?),
            "clear" => Self::Clear,
            "finish" => Self::Finish,
            _ => Self::Unknown,
        })
    }
}

impl DeltaEvent {
    /// Wire name of the event type
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetId(_) => "set-id",
            Self::SetTitle(_) => "set-title",
            Self::SetKind(_) => "set-kind",
            Self::TextDelta(_) => "text-delta",
            Self::CodeDelta(_) => "code-delta",
            Self::ImageDelta(_) => "image-delta",
            Self::SheetDelta(_) => "sheet-delta",
            Self::Suggestion(_) => "suggestion",
            Self::Clear => "clear",
            Self::Finish => "finish",
            Self::CorrelationId(_) => "correlation-id",
            Self::Unknown => "unknown",
        }
    }

    /// Whether folding this event can touch the artifact state
    #[inline]
    #[must_use]
    pub fn mutates_state(&self) -> bool {
        !matches!(
            self,
            Self::Suggestion(_) | Self::CorrelationId(_) | Self::Unknown
        )
    }

    #[inline]
    #[must_use]
    pub fn is_finish(&self) -> bool {
        matches!(self, Self::Finish)
    }
}
