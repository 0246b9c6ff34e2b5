//! `conversations` collection -> `conversations` + `participants`.

use bson::{Bson, Document};
use uuid::Uuid;

use super::fields::{
    field, flag, integer_i32, json_text, required_text, sub_documents, text, text_or, timestamp,
};
use super::records::{ConversationRecord, ParticipantRecord, Record};
use super::MappedRecords;
use crate::core::identifier::{canonical_id, translate};

const TYPE_MAX: usize = 20;
const NAME_MAX: usize = 255;
const USER_ID_MAX: usize = 100;
const ROLE_MAX: usize = 20;
const NICKNAME_MAX: usize = 100;

/// Null, empty containers and strings, zero and `false` carry no metadata.
fn is_blank(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined => true,
        Bson::String(s) => s.is_empty(),
        Bson::Array(a) => a.is_empty(),
        Bson::Document(d) => d.is_empty(),
        Bson::Boolean(b) => !b,
        Bson::Int32(n) => *n == 0,
        Bson::Int64(n) => *n == 0,
        Bson::Double(f) => *f == 0.0,
        _ => false,
    }
}

/// Map one conversation document.
pub fn map_conversation(doc: &Document) -> MappedRecords {
    let mut out = MappedRecords::new();

    let source_id = doc.get("_id").and_then(canonical_id).unwrap_or_default();
    let id = translate(&source_id);

    let last_message = match field(doc, "lastMessage") {
        Some(bson::Bson::Document(d)) => d.clone(),
        _ => Document::new(),
    };

    let metadata = match field(doc, "metadata") {
        Some(value) if !is_blank(value) => json_text(value),
        _ => "{}".to_string(),
    };

    out.push(Record::Conversation(ConversationRecord {
        id,
        kind: text_or(doc, "type", "direct", Some(TYPE_MAX)),
        name: text(doc, "name", Some(NAME_MAX)),
        description: text(doc, "description", None),
        avatar_url: text(doc, "avatar", None),
        created_by: text_or(doc, "creator", "", Some(USER_ID_MAX)),
        is_archived: flag(doc, "isArchived"),
        last_message_at: timestamp(&last_message, "createdAt"),
        last_message_preview: text(&last_message, "content", None),
        last_message_sender_id: text(&last_message, "senderId", Some(USER_ID_MAX)),
        disappearing_ttl_seconds: integer_i32(doc, "disappearingMessagesTimeout"),
        metadata,
        created_at: timestamp(doc, "createdAt"),
        updated_at: timestamp(doc, "updatedAt"),
    }));

    for participant in sub_documents(doc, "participants") {
        if let Some(record) = map_participant(id, participant) {
            out.push(Record::Participant(record));
        }
    }

    out
}

/// Participants without a `userId` are dropped.
fn map_participant(conversation_id: Uuid, participant: &Document) -> Option<ParticipantRecord> {
    let user_id = required_text(participant, "userId", Some(USER_ID_MAX))?;

    Some(ParticipantRecord {
        conversation_id,
        user_id,
        role: text_or(participant, "role", "member", Some(ROLE_MAX)),
        nickname: text(participant, "nickname", Some(NICKNAME_MAX)),
        is_muted: flag(participant, "isMuted"),
        muted_until: timestamp(participant, "mutedUntil"),
        unread_count: integer_i32(participant, "unreadCount").unwrap_or(0),
        last_read_at: timestamp(participant, "lastReadAt"),
        joined_at: timestamp(participant, "joinedAt"),
        left_at: timestamp(participant, "leftAt"),
    })
}
