//! Destination relation catalogue.
//!
//! The destination schemas are pre-created; this module only records what the
//! pipeline needs to know about them: which store a relation lives in, its
//! column order, and which columns form its primary key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of destination store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Relational store (PostgreSQL).
    Relational,
    /// Wide-column partitioned store (ScyllaDB).
    WideColumn,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Relational => write!(f, "postgres"),
            StoreKind::WideColumn => write!(f, "scylla"),
        }
    }
}

/// A destination relation (table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Conversations,
    Participants,
    Messages,
    MessagesBySender,
    MessageReactions,
    DeliveryReceipts,
    ReadReceipts,
}

impl Relation {
    /// Every relation, in catalogue order.
    pub const ALL: [Relation; 7] = [
        Relation::Conversations,
        Relation::Participants,
        Relation::Messages,
        Relation::MessagesBySender,
        Relation::MessageReactions,
        Relation::DeliveryReceipts,
        Relation::ReadReceipts,
    ];

    /// Unqualified table name.
    pub fn table_name(&self) -> &'static str {
        match self {
            Relation::Conversations => "conversations",
            Relation::Participants => "participants",
            Relation::Messages => "messages",
            Relation::MessagesBySender => "messages_by_sender",
            Relation::MessageReactions => "message_reactions",
            Relation::DeliveryReceipts => "delivery_receipts",
            Relation::ReadReceipts => "read_receipts",
        }
    }

    /// Store the relation lives in.
    pub fn store(&self) -> StoreKind {
        match self {
            Relation::Conversations | Relation::Participants => StoreKind::Relational,
            _ => StoreKind::WideColumn,
        }
    }

    /// Column names in row order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Relation::Conversations => &[
                "id",
                "type",
                "name",
                "description",
                "avatar_url",
                "created_by",
                "is_archived",
                "last_message_at",
                "last_message_preview",
                "last_message_sender_id",
                "disappearing_ttl_seconds",
                "metadata",
                "created_at",
                "updated_at",
            ],
            Relation::Participants => &[
                "conversation_id",
                "user_id",
                "role",
                "nickname",
                "is_muted",
                "muted_until",
                "unread_count",
                "last_read_at",
                "joined_at",
                "left_at",
            ],
            Relation::Messages => &[
                "conversation_id",
                "created_at",
                "message_id",
                "sender_id",
                "type",
                "content",
                "reply_to_id",
                "mentions",
                "attachments",
                "is_edited",
                "is_deleted",
                "deleted_by",
                "deleted_for",
                "edited_at",
                "edit_history",
                "is_forwarded",
                "client_id",
                "metadata",
            ],
            Relation::MessagesBySender => &[
                "sender_id",
                "created_at",
                "message_id",
                "conversation_id",
                "content",
            ],
            Relation::MessageReactions => &[
                "conversation_id",
                "message_id",
                "emoji",
                "user_id",
                "created_at",
            ],
            Relation::DeliveryReceipts => {
                &["conversation_id", "message_id", "user_id", "delivered_at"]
            }
            Relation::ReadReceipts => &["conversation_id", "user_id", "last_read_at", "last_read_msg"],
        }
    }

    /// Primary key columns.
    pub fn key_columns(&self) -> &'static [&'static str] {
        match self {
            Relation::Conversations => &["id"],
            Relation::Participants => &["conversation_id", "user_id"],
            Relation::Messages => &["conversation_id", "created_at", "message_id"],
            Relation::MessagesBySender => &["sender_id", "created_at", "message_id"],
            Relation::MessageReactions => &["conversation_id", "message_id", "emoji", "user_id"],
            Relation::DeliveryReceipts => &["conversation_id", "message_id", "user_id"],
            Relation::ReadReceipts => &["conversation_id", "user_id"],
        }
    }

    /// Positions of the primary key columns within a row.
    pub fn key_indices(&self) -> Vec<usize> {
        let columns = self.columns();
        self.key_columns()
            .iter()
            .filter_map(|k| columns.iter().position(|c| c == k))
            .collect()
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_column_is_a_column() {
        for relation in Relation::ALL {
            assert_eq!(
                relation.key_indices().len(),
                relation.key_columns().len(),
                "{} has a key column missing from its column list",
                relation
            );
        }
    }

    #[test]
    fn test_store_assignment() {
        assert_eq!(Relation::Participants.store(), StoreKind::Relational);
        assert_eq!(Relation::ReadReceipts.store(), StoreKind::WideColumn);
    }

    #[test]
    fn test_message_key_indices() {
        assert_eq!(Relation::Messages.key_indices(), vec![0, 1, 2]);
        assert_eq!(Relation::MessageReactions.key_indices(), vec![0, 1, 2, 3]);
    }
}
