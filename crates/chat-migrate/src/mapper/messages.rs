//! `messages` collection -> messages, sender index, reactions, delivery
//! receipts, and read-position candidates.

use bson::{Bson, Document};
use chrono::{DateTime, Utc};

use super::fields::{
    encode_attachments, encode_edit_history, field, flag, required_text, string_set,
    sub_documents, text, text_or, timestamp,
};
use super::records::{
    DeliveryReceiptRecord, MessageRecord, ReactionRecord, ReadReceiptRecord, Record,
    SenderIndexRecord,
};
use super::MappedRecords;
use crate::core::identifier::{canonical_id, translate};

/// Map one message document.
///
/// Read events are emitted as [`Record::ReadReceipt`] candidates; the driver
/// routes them into the aggregation window rather than the writer.
pub fn map_message(doc: &Document) -> MappedRecords {
    let mut out = MappedRecords::new();

    let source_id = doc.get("_id");
    let message_id = translate(&source_id.and_then(canonical_id).unwrap_or_default());
    let conversation_id = translate(
        &field(doc, "conversation_id")
            .and_then(canonical_id)
            .unwrap_or_default(),
    );
    let created_at = timestamp(doc, "created_at")
        .or_else(|| object_id_time(source_id))
        .unwrap_or(DateTime::UNIX_EPOCH);
    let sender_id = text_or(doc, "sender_id", "", None);
    let content = text_or(doc, "content", "", None);

    let reply_to_id = field(doc, "reply_to")
        .and_then(canonical_id)
        .filter(|id| !id.is_empty())
        .map(|id| translate(&id));

    out.push(Record::Message(MessageRecord {
        conversation_id,
        created_at,
        message_id,
        sender_id: sender_id.clone(),
        kind: text_or(doc, "type", "text", None),
        content: content.clone(),
        reply_to_id,
        mentions: string_set(doc, "mentions"),
        attachments: encode_attachments(doc, "attachments"),
        is_edited: flag(doc, "edited"),
        is_deleted: flag(doc, "deleted"),
        deleted_by: text(doc, "deleted_by", None),
        deleted_for: string_set(doc, "deleted_for"),
        edited_at: timestamp(doc, "edited_at"),
        edit_history: encode_edit_history(doc, "edit_history"),
        // Not present in the source documents.
        is_forwarded: false,
        client_id: None,
        metadata: None,
    }));

    // The sender index is partitioned by sender.
    if !sender_id.is_empty() {
        out.push(Record::SenderIndex(SenderIndexRecord {
            sender_id,
            created_at,
            message_id,
            conversation_id,
            content,
        }));
    }

    for reaction in sub_documents(doc, "reactions") {
        let (Some(user_id), Some(emoji)) = (
            required_text(reaction, "user_id", None),
            required_text(reaction, "emoji", None),
        ) else {
            continue;
        };
        out.push(Record::Reaction(ReactionRecord {
            conversation_id,
            message_id,
            emoji,
            user_id,
            created_at: timestamp(reaction, "created_at"),
        }));
    }

    for delivery in sub_documents(doc, "delivered_to") {
        let Some(user_id) = required_text(delivery, "user_id", None) else {
            continue;
        };
        out.push(Record::DeliveryReceipt(DeliveryReceiptRecord {
            conversation_id,
            message_id,
            user_id,
            delivered_at: timestamp(delivery, "delivered_at"),
        }));
    }

    for read in sub_documents(doc, "read_by") {
        let (Some(user_id), Some(read_at)) = (
            required_text(read, "user_id", None),
            timestamp(read, "read_at"),
        ) else {
            continue;
        };
        out.push(Record::ReadReceipt(ReadReceiptRecord {
            conversation_id,
            user_id,
            last_read_at: read_at,
            last_read_msg: message_id,
        }));
    }

    out
}

/// Creation time embedded in an ObjectId, used when `created_at` is missing
/// because it is part of the message clustering key. Ids that are not
/// ObjectIds fall back to the Unix epoch.
fn object_id_time(id: Option<&Bson>) -> Option<DateTime<Utc>> {
    match id {
        Some(Bson::ObjectId(oid)) => Some(oid.timestamp().to_chrono()),
        _ => None,
    }
}
