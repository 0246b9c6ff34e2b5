//! Record mapping: one source document in, per-relation records out.
//!
//! Mappers are pure functions. They never fail; malformed sub-documents are
//! resolved by the default/drop policy in [`fields`].

pub mod conversations;
pub mod fields;
pub mod messages;
pub mod records;

pub use conversations::map_conversation;
pub use messages::map_message;
pub use records::{
    ConversationRecord, DeliveryReceiptRecord, MessageRecord, ParticipantRecord, ReactionRecord,
    ReadKey, ReadReceiptRecord, Record, SenderIndexRecord,
};

use std::collections::BTreeMap;

use crate::core::Relation;

/// Fan-out of one source document, grouped by destination relation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MappedRecords {
    by_relation: BTreeMap<Relation, Vec<Record>>,
}

impl MappedRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record under its own relation.
    pub fn push(&mut self, record: Record) {
        self.by_relation
            .entry(record.relation())
            .or_default()
            .push(record);
    }

    /// Records for one relation (empty slice when none).
    pub fn get(&self, relation: Relation) -> &[Record] {
        self.by_relation
            .get(&relation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of records for one relation.
    pub fn count(&self, relation: Relation) -> usize {
        self.get(relation).len()
    }

    /// Total records across relations.
    pub fn len(&self) -> usize {
        self.by_relation.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume into `(relation, records)` pairs in relation order.
    pub fn into_groups(self) -> impl Iterator<Item = (Relation, Vec<Record>)> {
        self.by_relation.into_iter()
    }
}
