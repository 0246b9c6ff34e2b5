//! Deterministic source-id to destination-id translation.
//!
//! Every destination relation identifies rows by UUID. Source documents are
//! keyed by MongoDB `ObjectId`s (or, for references, their hex string form).
//! Translation is a name-based UUID v5 under one fixed namespace, so the
//! conversations and messages pipelines resolve the same source id to the
//! same UUID without sharing any state, across processes and reruns.

use bson::Bson;
use uuid::Uuid;

/// Namespace shared by every pipeline in the migration family.
pub const NAMESPACE: Uuid = Uuid::from_u128(0xa1b2c3d4_e5f6_7890_abcd_ef1234567890);

/// Translate an already canonical source id string.
pub fn translate(source_id: &str) -> Uuid {
    Uuid::new_v5(&NAMESPACE, source_id.as_bytes())
}

/// Translate a raw BSON identifier.
///
/// Returns `None` for null/undefined values, which carry no identity.
pub fn translate_bson(value: &Bson) -> Option<Uuid> {
    canonical_id(value).map(|id| translate(&id))
}

/// Canonical string form of a BSON identifier.
///
/// An `ObjectId` and its 24-char hex string render identically, which is
/// what lets a message's `conversation_id` string resolve to the same UUID
/// as the conversation document's `_id`.
pub fn canonical_id(value: &Bson) -> Option<String> {
    match value {
        Bson::Null | Bson::Undefined => None,
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        Bson::String(s) => Some(s.clone()),
        Bson::Int32(n) => Some(n.to_string()),
        Bson::Int64(n) => Some(n.to_string()),
        Bson::Binary(bin) if bin.subtype == bson::spec::BinarySubtype::Uuid => {
            Uuid::from_slice(&bin.bytes).ok().map(|u| u.to_string())
        }
        other => Some(other.to_string()),
    }
}
