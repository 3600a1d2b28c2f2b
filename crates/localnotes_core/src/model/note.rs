//! Note record and typed partial update.
//!
//! # Invariants
//! - `id` and `created_at` are fixed at creation; `NotePatch` cannot
//!   express a change to either.
//! - Decoding accepts any well-formed note; `validate` reports broken
//!   invariants so the collection decoder can repair them.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const UNTITLED_LABEL: &str = "Untitled";
const EMPTY_CONTENT_LABEL: &str = "No content yet";

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Opaque note identifier.
///
/// Usually a hyphenated UUID, but any non-empty string read back from
/// storage is accepted, including timestamp ids from the weak fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for NoteId {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Invariant broken by a decoded note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    EmptyId,
    UpdatedBeforeCreated {
        id: NoteId,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    },
    DuplicateId(NoteId),
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "note id must not be empty"),
            Self::UpdatedBeforeCreated {
                id,
                created_at,
                updated_at,
            } => write!(
                f,
                "note {id}: updatedAt ({updated_at}) must be >= createdAt ({created_at})"
            ),
            Self::DuplicateId(id) => write!(f, "duplicate note id: {id}"),
        }
    }
}

impl Error for NoteValidationError {}

/// One user note.
///
/// Serialized with camelCase keys and RFC 3339 timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawNote")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNote {
    id: NoteId,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RawNote> for Note {
    fn from(raw: RawNote) -> Self {
        Self {
            id: raw.id,
            title: raw.title.unwrap_or_default(),
            content: raw.content.unwrap_or_default(),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

impl Note {
    /// Creates an empty note stamped with `now` for both timestamps.
    pub fn empty(id: NoteId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: String::new(),
            content: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.id.as_str().is_empty() {
            return Err(NoteValidationError::EmptyId);
        }
        if self.updated_at < self.created_at {
            return Err(NoteValidationError::UpdatedBeforeCreated {
                id: self.id.clone(),
                created_at: self.created_at,
                updated_at: self.updated_at,
            });
        }
        Ok(())
    }

    /// Applies `patch` and stamps `updated_at`.
    ///
    /// `updated_at` never moves before `created_at`, even if the clock
    /// stepped backwards since creation.
    pub fn apply(&mut self, patch: NotePatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        self.updated_at = now.max(self.created_at);
    }

    /// Title for list rows and headers.
    pub fn display_title(&self) -> &str {
        let trimmed = self.title.trim();
        if trimmed.is_empty() {
            UNTITLED_LABEL
        } else {
            trimmed
        }
    }

    /// Single-line content summary capped at `max_chars` characters.
    pub fn display_excerpt(&self, max_chars: usize) -> String {
        let collapsed = WHITESPACE_RE.replace_all(self.content.trim(), " ");
        if collapsed.is_empty() {
            return EMPTY_CONTENT_LABEL.to_string();
        }

        let mut excerpt = collapsed.chars().take(max_chars).collect::<String>();
        if collapsed.chars().count() > max_chars {
            excerpt.push_str("...");
        }
        excerpt
    }

    /// Question the UI shows before calling delete.
    pub fn delete_prompt(&self) -> String {
        let trimmed = self.title.trim();
        if trimmed.is_empty() {
            "Are you sure you want to delete this note?".to_string()
        } else {
            format!("Are you sure you want to delete \"{trimmed}\"?")
        }
    }
}

/// Typed partial update for the mutable note fields.
///
/// Unknown keys (including `id`, `createdAt`) are ignored when decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl NotePatch {
    pub fn title(value: impl Into<String>) -> Self {
        Self {
            title: Some(value.into()),
            content: None,
        }
    }

    pub fn content(value: impl Into<String>) -> Self {
        Self {
            title: None,
            content: Some(value.into()),
        }
    }

    pub fn title_and_content(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: Some(content.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}
