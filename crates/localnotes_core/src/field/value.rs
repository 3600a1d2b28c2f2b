//! JSON codec and repair hook for persisted field values.

use crate::model::note::{Note, NoteId, NoteValidationError};
use crate::model::theme::Theme;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;

/// Value type that can live in a `PersistentField`.
pub trait FieldValue: Clone + PartialEq + Serialize + DeserializeOwned {
    /// Fixes a decoded value that parses but breaks model invariants.
    ///
    /// Returns one description per repair, empty when nothing changed.
    fn repair(&mut self) -> Vec<String> {
        Vec::new()
    }
}

impl FieldValue for Vec<Note> {
    /// Drops notes with an empty id and every later note reusing an id,
    /// and lifts `updatedAt` up to `createdAt`. All other notes survive.
    fn repair(&mut self) -> Vec<String> {
        let mut repairs = Vec::new();
        let mut seen = HashSet::with_capacity(self.len());
        self.retain_mut(|note| {
            if let Err(err) = note.validate() {
                repairs.push(err.to_string());
                match err {
                    NoteValidationError::EmptyId => return false,
                    NoteValidationError::UpdatedBeforeCreated { .. } => {
                        note.updated_at = note.created_at;
                    }
                    NoteValidationError::DuplicateId(_) => {}
                }
            }
            if !seen.insert(note.id.clone()) {
                repairs.push(NoteValidationError::DuplicateId(note.id.clone()).to_string());
                return false;
            }
            true
        });
        repairs
    }
}

impl FieldValue for Option<NoteId> {}

impl FieldValue for String {}

impl FieldValue for Theme {}

/// Result of decoding one stored payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    /// Set when the payload did not parse and `value` is the default.
    pub fallback_reason: Option<String>,
    /// Per-item fixes applied to a payload that did parse.
    pub repairs: Vec<String>,
}

/// Encodes one field value as JSON text.
pub fn encode<T: FieldValue>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

/// Decodes `raw`, returning `default` when it is absent or does not parse.
///
/// A payload that parses is repaired in place rather than discarded.
pub fn decode_or_default<T: FieldValue>(raw: Option<&str>, default: &T) -> Decoded<T> {
    let Some(raw) = raw else {
        return Decoded {
            value: default.clone(),
            fallback_reason: None,
            repairs: Vec::new(),
        };
    };

    match serde_json::from_str::<T>(raw) {
        Ok(mut value) => {
            let repairs = value.repair();
            Decoded {
                value,
                fallback_reason: None,
                repairs,
            }
        }
        Err(err) => Decoded {
            value: default.clone(),
            fallback_reason: Some(err.to_string()),
            repairs: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_or_default, encode};
    use crate::model::note::{Note, NoteId};
    use crate::model::theme::Theme;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn absent_and_malformed_payloads_decode_to_default() {
        let absent = decode_or_default::<Theme>(None, &Theme::Light);
        assert_eq!(absent.value, Theme::Light);
        assert!(absent.fallback_reason.is_none());

        for raw in ["", "{", "\"sepia\"", "42"] {
            let decoded = decode_or_default::<Theme>(Some(raw), &Theme::Light);
            assert_eq!(decoded.value, Theme::Light, "payload {raw:?}");
            assert!(decoded.fallback_reason.is_some(), "payload {raw:?}");
        }
    }

    #[test]
    fn selection_accepts_null_and_string() {
        let none = decode_or_default::<Option<NoteId>>(Some("null"), &None);
        assert_eq!(none.value, None);

        let some = decode_or_default::<Option<NoteId>>(Some("\"abc\""), &None);
        assert_eq!(some.value, Some(NoteId::new("abc")));
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence_and_other_notes() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut first_b = Note::empty(NoteId::new("b"), now);
        first_b.title = "first".to_string();
        let mut second_b = Note::empty(NoteId::new("b"), now + Duration::minutes(1));
        second_b.title = "second".to_string();
        let a = Note::empty(NoteId::new("a"), now);
        let raw = encode(&vec![a.clone(), first_b.clone(), second_b]).unwrap();

        let decoded = decode_or_default::<Vec<Note>>(Some(&raw), &Vec::new());

        assert_eq!(decoded.value, vec![a, first_b]);
        assert!(decoded.fallback_reason.is_none());
        assert_eq!(decoded.repairs.len(), 1);
        assert!(decoded.repairs[0].contains("duplicate note id: b"));
    }

    #[test]
    fn notes_use_camel_case_iso_timestamps() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 8, 30, 0).unwrap();
        let note = Note::empty(NoteId::new("n1"), created);

        let json: serde_json::Value = serde_json::from_str(&encode(&vec![note]).unwrap()).unwrap();

        assert_eq!(json[0]["id"], "n1");
        assert_eq!(json[0]["createdAt"], "2024-01-01T08:30:00Z");
        assert_eq!(json[0]["updatedAt"], "2024-01-01T08:30:00Z");
        assert_eq!(json[0]["title"], "");
    }

    #[test]
    fn browser_style_payload_with_millis_and_null_title_decodes() {
        let raw = r#"[{"id":"1717000000000","title":null,"content":"milk",
            "createdAt":"2024-05-29T16:26:40.000Z","updatedAt":"2024-05-29T16:27:00.123Z"}]"#;

        let decoded = decode_or_default::<Vec<Note>>(Some(raw), &Vec::new());

        assert!(decoded.fallback_reason.is_none(), "{:?}", decoded.fallback_reason);
        assert!(decoded.repairs.is_empty());
        assert_eq!(decoded.value.len(), 1);
        assert_eq!(decoded.value[0].title, "");
        assert_eq!(decoded.value[0].content, "milk");
    }

    #[test]
    fn reversed_timestamps_are_clamped_to_created_at() {
        let raw = r#"[{"id":"x","title":"kept","content":"",
            "createdAt":"2024-05-29T16:27:00Z","updatedAt":"2024-05-29T16:26:00Z"},
            {"id":"","title":"","content":"",
            "createdAt":"2024-05-29T16:27:00Z","updatedAt":"2024-05-29T16:27:00Z"}]"#;

        let decoded = decode_or_default::<Vec<Note>>(Some(raw), &Vec::new());

        assert_eq!(decoded.value.len(), 1);
        let note = &decoded.value[0];
        assert_eq!(note.title, "kept");
        assert_eq!(note.updated_at, note.created_at);
        assert_eq!(decoded.repairs.len(), 2);
        assert!(decoded.repairs[0].contains("must be >= createdAt"));
        assert!(decoded.repairs[1].contains("must not be empty"));
    }
}
