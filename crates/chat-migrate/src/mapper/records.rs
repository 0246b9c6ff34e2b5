//! Typed destination record shapes.
//!
//! One flat struct per relation. Foreign references are always translated
//! UUIDs. [`Record`] tags a shape with its relation so a mapped document can
//! carry every shape in one collection without a common base type.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::{Relation, Row, SqlValue};

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationRecord {
    pub id: Uuid,
    pub kind: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub created_by: String,
    pub is_archived: bool,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_preview: Option<String>,
    pub last_message_sender_id: Option<String>,
    pub disappearing_ttl_seconds: Option<i32>,
    pub metadata: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantRecord {
    pub conversation_id: Uuid,
    pub user_id: String,
    pub role: String,
    pub nickname: Option<String>,
    pub is_muted: bool,
    pub muted_until: Option<DateTime<Utc>>,
    pub unread_count: i32,
    pub last_read_at: Option<DateTime<Utc>>,
    pub joined_at: Option<DateTime<Utc>>,
    pub left_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub conversation_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub message_id: Uuid,
    pub sender_id: String,
    pub kind: String,
    pub content: String,
    pub reply_to_id: Option<Uuid>,
    pub mentions: Option<BTreeSet<String>>,
    pub attachments: Option<String>,
    pub is_edited: bool,
    pub is_deleted: bool,
    pub deleted_by: Option<String>,
    pub deleted_for: Option<BTreeSet<String>>,
    pub edited_at: Option<DateTime<Utc>>,
    pub edit_history: Option<String>,
    pub is_forwarded: bool,
    pub client_id: Option<String>,
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SenderIndexRecord {
    pub sender_id: String,
    pub created_at: DateTime<Utc>,
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReactionRecord {
    pub conversation_id: Uuid,
    pub message_id: Uuid,
    pub emoji: String,
    pub user_id: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceiptRecord {
    pub conversation_id: Uuid,
    pub message_id: Uuid,
    pub user_id: String,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Read position of one user in one conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadReceiptRecord {
    pub conversation_id: Uuid,
    pub user_id: String,
    pub last_read_at: DateTime<Utc>,
    pub last_read_msg: Uuid,
}

/// Aggregation key of the read-position window.
pub type ReadKey = (Uuid, String);

impl ReadReceiptRecord {
    pub fn key(&self) -> ReadKey {
        (self.conversation_id, self.user_id.clone())
    }
}

/// A destination record tagged with its relation.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Conversation(ConversationRecord),
    Participant(ParticipantRecord),
    Message(MessageRecord),
    SenderIndex(SenderIndexRecord),
    Reaction(ReactionRecord),
    DeliveryReceipt(DeliveryReceiptRecord),
    ReadReceipt(ReadReceiptRecord),
}

impl Record {
    /// Relation this record is written to.
    pub fn relation(&self) -> Relation {
        match self {
            Record::Conversation(_) => Relation::Conversations,
            Record::Participant(_) => Relation::Participants,
            Record::Message(_) => Relation::Messages,
            Record::SenderIndex(_) => Relation::MessagesBySender,
            Record::Reaction(_) => Relation::MessageReactions,
            Record::DeliveryReceipt(_) => Relation::DeliveryReceipts,
            Record::ReadReceipt(_) => Relation::ReadReceipts,
        }
    }

    /// Flatten into a row ordered like [`Relation::columns`].
    pub fn into_row(self) -> Row {
        match self {
            Record::Conversation(r) => vec![
                r.id.into(),
                r.kind.into(),
                SqlValue::opt_text(r.name),
                SqlValue::opt_text(r.description),
                SqlValue::opt_text(r.avatar_url),
                r.created_by.into(),
                r.is_archived.into(),
                SqlValue::opt_timestamp(r.last_message_at),
                SqlValue::opt_text(r.last_message_preview),
                SqlValue::opt_text(r.last_message_sender_id),
                SqlValue::opt_i32(r.disappearing_ttl_seconds),
                SqlValue::Json(r.metadata),
                SqlValue::opt_timestamp(r.created_at),
                SqlValue::opt_timestamp(r.updated_at),
            ],
            Record::Participant(r) => vec![
                r.conversation_id.into(),
                r.user_id.into(),
                r.role.into(),
                SqlValue::opt_text(r.nickname),
                r.is_muted.into(),
                SqlValue::opt_timestamp(r.muted_until),
                r.unread_count.into(),
                SqlValue::opt_timestamp(r.last_read_at),
                SqlValue::opt_timestamp(r.joined_at),
                SqlValue::opt_timestamp(r.left_at),
            ],
            Record::Message(r) => vec![
                r.conversation_id.into(),
                r.created_at.into(),
                r.message_id.into(),
                r.sender_id.into(),
                r.kind.into(),
                r.content.into(),
                SqlValue::opt_uuid(r.reply_to_id),
                SqlValue::opt_set(r.mentions),
                SqlValue::opt_json(r.attachments),
                r.is_edited.into(),
                r.is_deleted.into(),
                SqlValue::opt_text(r.deleted_by),
                SqlValue::opt_set(r.deleted_for),
                SqlValue::opt_timestamp(r.edited_at),
                SqlValue::opt_json(r.edit_history),
                r.is_forwarded.into(),
                SqlValue::opt_text(r.client_id),
                SqlValue::opt_text(r.metadata),
            ],
            Record::SenderIndex(r) => vec![
                r.sender_id.into(),
                r.created_at.into(),
                r.message_id.into(),
                r.conversation_id.into(),
                r.content.into(),
            ],
            Record::Reaction(r) => vec![
                r.conversation_id.into(),
                r.message_id.into(),
                r.emoji.into(),
                r.user_id.into(),
                SqlValue::opt_timestamp(r.created_at),
            ],
            Record::DeliveryReceipt(r) => vec![
                r.conversation_id.into(),
                r.message_id.into(),
                r.user_id.into(),
                SqlValue::opt_timestamp(r.delivered_at),
            ],
            Record::ReadReceipt(r) => vec![
                r.conversation_id.into(),
                r.user_id.into(),
                r.last_read_at.into(),
                r.last_read_msg.into(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identifier::translate;

    #[test]
    fn test_rows_match_relation_width() {
        let now = Utc::now();
        let records = vec![
            Record::Participant(ParticipantRecord {
                conversation_id: translate("c"),
                user_id: "u1".into(),
                role: "member".into(),
                nickname: None,
                is_muted: false,
                muted_until: None,
                unread_count: 0,
                last_read_at: None,
                joined_at: Some(now),
                left_at: None,
            }),
            Record::ReadReceipt(ReadReceiptRecord {
                conversation_id: translate("c"),
                user_id: "u1".into(),
                last_read_at: now,
                last_read_msg: translate("m"),
            }),
            Record::DeliveryReceipt(DeliveryReceiptRecord {
                conversation_id: translate("c"),
                message_id: translate("m"),
                user_id: "u2".into(),
                delivered_at: None,
            }),
        ];

        for record in records {
            let relation = record.relation();
            assert_eq!(record.into_row().len(), relation.columns().len());
        }
    }
}
