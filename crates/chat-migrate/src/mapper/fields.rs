//! Field-level normalization policy shared by the mappers.
//!
//! Nothing here fails: absent, null, or wrongly-typed source fields resolve to
//! `None` (or the caller's default) instead of an error.

use std::collections::BTreeSet;

use bson::{Bson, Document};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

/// Look up a field, treating explicit null/undefined as absent.
pub fn field<'a>(doc: &'a Document, key: &str) -> Option<&'a Bson> {
    match doc.get(key) {
        None | Some(Bson::Null) | Some(Bson::Undefined) => None,
        Some(value) => Some(value),
    }
}

/// String form of any scalar BSON value.
pub fn to_text(value: &Bson) -> Option<String> {
    match value {
        Bson::Null | Bson::Undefined => None,
        Bson::String(s) => Some(s.clone()),
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        Bson::Int32(n) => Some(n.to_string()),
        Bson::Int64(n) => Some(n.to_string()),
        Bson::Double(n) => Some(n.to_string()),
        Bson::Boolean(b) => Some(b.to_string()),
        Bson::DateTime(dt) => Some(dt.to_chrono().to_rfc3339_opts(SecondsFormat::Millis, true)),
        other => Some(other.to_string()),
    }
}

/// Keep at most `max_chars` characters. Lossy by design.
pub fn truncate(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text,
    }
}

/// Optional string field, truncated when `max_chars` is given.
pub fn text(doc: &Document, key: &str, max_chars: Option<usize>) -> Option<String> {
    let value = field(doc, key).and_then(to_text)?;
    Some(match max_chars {
        Some(max) => truncate(value, max),
        None => value,
    })
}

/// String field with a default for absent values.
pub fn text_or(doc: &Document, key: &str, default: &str, max_chars: Option<usize>) -> String {
    text(doc, key, max_chars).unwrap_or_else(|| match max_chars {
        Some(max) => truncate(default.to_string(), max),
        None => default.to_string(),
    })
}

/// Non-empty string field; `None` marks a missing discriminator.
pub fn required_text(doc: &Document, key: &str, max_chars: Option<usize>) -> Option<String> {
    text(doc, key, max_chars).filter(|s| !s.is_empty())
}

/// Truthiness of a field; absent is false.
pub fn flag(doc: &Document, key: &str) -> bool {
    match field(doc, key) {
        None => false,
        Some(Bson::Boolean(b)) => *b,
        Some(Bson::Int32(n)) => *n != 0,
        Some(Bson::Int64(n)) => *n != 0,
        Some(Bson::Double(n)) => *n != 0.0,
        Some(Bson::String(s)) => !s.is_empty(),
        Some(Bson::Array(items)) => !items.is_empty(),
        Some(Bson::Document(d)) => !d.is_empty(),
        Some(_) => true,
    }
}

/// Integer field; non-numeric values count as absent.
pub fn integer(doc: &Document, key: &str) -> Option<i64> {
    match field(doc, key)? {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        Bson::Double(n) if n.is_finite() => Some(n.trunc() as i64),
        _ => None,
    }
}

/// 32-bit integer field; out-of-range values count as absent.
pub fn integer_i32(doc: &Document, key: &str) -> Option<i32> {
    integer(doc, key).and_then(|n| i32::try_from(n).ok())
}

/// Timezone-aware instant. BSON dates are UTC milliseconds, so there is no
/// naive case to resolve; anything that is not a date maps to `None`.
pub fn timestamp(doc: &Document, key: &str) -> Option<DateTime<Utc>> {
    match field(doc, key)? {
        Bson::DateTime(dt) => Some(dt.to_chrono()),
        _ => None,
    }
}

/// Array field as a string set; empty or absent maps to `None`.
pub fn string_set(doc: &Document, key: &str) -> Option<BTreeSet<String>> {
    let items = match field(doc, key)? {
        Bson::Array(items) => items,
        _ => return None,
    };
    let set: BTreeSet<String> = items.iter().filter_map(to_text).collect();
    if set.is_empty() {
        None
    } else {
        Some(set)
    }
}

/// Embedded sub-documents of an array field. Non-document elements are
/// skipped.
pub fn sub_documents<'a>(doc: &'a Document, key: &str) -> impl Iterator<Item = &'a Document> {
    let items: &'a [Bson] = match field(doc, key) {
        Some(Bson::Array(items)) => items.as_slice(),
        _ => &[],
    };
    items.iter().filter_map(|item| item.as_document())
}

/// Serialize a BSON value to JSON text.
pub fn json_text(value: &Bson) -> String {
    value.clone().into_relaxed_extjson().to_string()
}

/// Encode an attachment list. Empty or absent maps to `None`.
pub fn encode_attachments(doc: &Document, key: &str) -> Option<String> {
    let cleaned: Vec<Value> = sub_documents(doc, key)
        .map(|att| {
            json!({
                "id": text_or(att, "id", "", None),
                "file_type": text_or(att, "file_type", "", None),
                "file_name": text_or(att, "file_name", "", None),
                "file_size": integer(att, "file_size").unwrap_or(0),
                "url": text_or(att, "url", "", None),
                "thumbnail_url": text_or(att, "thumbnail_url", "", None),
            })
        })
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(Value::Array(cleaned).to_string())
    }
}

/// Encode an edit-history list. Empty or absent maps to `None`.
pub fn encode_edit_history(doc: &Document, key: &str) -> Option<String> {
    let cleaned: Vec<Value> = sub_documents(doc, key)
        .map(|entry| {
            json!({
                "content": text_or(entry, "content", "", None),
                "edited_at": text_or(entry, "edited_at", "", None),
            })
        })
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(Value::Array(cleaned).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_counts_characters() {
        let long = "é".repeat(300);
        let cut = truncate(long, 255);
        assert_eq!(cut.chars().count(), 255);
        assert_eq!(truncate("short".to_string(), 255), "short");
    }

    #[test]
    fn test_text_truncates_to_max() {
        let name = "n".repeat(300);
        let d = doc! { "name": name.clone() };
        let mapped = text(&d, "name", Some(255)).unwrap();
        assert_eq!(mapped, &name[..255]);
    }

    #[test]
    fn test_null_is_absent() {
        let d = doc! { "type": Bson::Null };
        assert_eq!(text_or(&d, "type", "direct", Some(20)), "direct");
        assert!(!flag(&d, "type"));
    }

    #[test]
    fn test_flag_defaults_false() {
        let d = doc! { "a": true, "b": 0, "c": "" };
        assert!(flag(&d, "a"));
        assert!(!flag(&d, "b"));
        assert!(!flag(&d, "c"));
        assert!(!flag(&d, "missing"));
    }

    #[test]
    fn test_timestamp_only_accepts_dates() {
        let when = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let d = doc! {
            "at": bson::DateTime::from_chrono(when),
            "text": "2024-05-01T12:00:00Z",
        };
        assert_eq!(timestamp(&d, "at"), Some(when));
        assert_eq!(timestamp(&d, "text"), None);
        assert_eq!(timestamp(&d, "missing"), None);
    }

    #[test]
    fn test_string_set_empty_is_none() {
        let d = doc! { "empty": [], "tags": ["b", "a", "b"] };
        assert!(string_set(&d, "empty").is_none());
        let tags = string_set(&d, "tags").unwrap();
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_encode_attachments_fills_defaults() {
        let d = doc! { "attachments": [{ "id": 7, "url": "https://cdn/x.png" }] };
        let encoded = encode_attachments(&d, "attachments").unwrap();
        let parsed: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(parsed[0]["id"], "7");
        assert_eq!(parsed[0]["file_size"], 0);
        assert_eq!(parsed[0]["thumbnail_url"], "");
        assert_eq!(parsed[0]["url"], "https://cdn/x.png");
    }

    #[test]
    fn test_empty_lists_encode_to_none() {
        let d = doc! { "attachments": [], "edit_history": [] };
        assert!(encode_attachments(&d, "attachments").is_none());
        assert!(encode_edit_history(&d, "edit_history").is_none());
        assert!(encode_edit_history(&d, "missing").is_none());
    }

    #[test]
    fn test_edit_history_renders_dates() {
        let when = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let d = doc! {
            "edit_history": [{ "content": "v1", "edited_at": bson::DateTime::from_chrono(when) }]
        };
        let parsed: Value =
            serde_json::from_str(&encode_edit_history(&d, "edit_history").unwrap()).unwrap();
        assert_eq!(parsed[0]["content"], "v1");
        assert_eq!(parsed[0]["edited_at"], "2024-05-01T12:00:00.000Z");
    }

    #[test]
    fn test_json_text_for_metadata() {
        let d = doc! { "pinned": true };
        assert_eq!(json_text(&Bson::Document(d)), r#"{"pinned":true}"#);
    }
}
