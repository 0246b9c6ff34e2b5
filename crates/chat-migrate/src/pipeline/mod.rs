//! Pipeline definitions.
//!
//! Both migrations run through the same driver. A [`PipelineKind`] supplies
//! everything that differs between them: the source collection, the
//! relations written, which relation is the flush-threshold primary, which
//! relation goes through the aggregation window, the mapper, and how each
//! relation's source-side count is obtained for reconciliation.

use std::fmt;
use std::str::FromStr;

use bson::Document;
use serde::{Deserialize, Serialize};

use crate::core::Relation;
use crate::error::MigrateError;
use crate::mapper::{map_conversation, map_message, MappedRecords};

/// How the source side of a relation is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCount {
    /// One row per source document (estimated collection size).
    Documents,
    /// One row per element of an embedded array.
    Embedded(&'static str),
    /// No meaningful source count (aggregated relations).
    Unchecked,
}

/// One of the two migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    Conversations,
    Messages,
}

impl PipelineKind {
    /// Every pipeline, in the order `all` runs them. Conversations first so
    /// message rows reference conversations that already exist.
    pub const ALL: [PipelineKind; 2] = [PipelineKind::Conversations, PipelineKind::Messages];

    pub fn name(&self) -> &'static str {
        match self {
            PipelineKind::Conversations => "conversations",
            PipelineKind::Messages => "messages",
        }
    }

    /// Source collection name.
    pub fn collection(&self) -> &'static str {
        self.name()
    }

    /// Relation whose buffer size triggers a flush.
    pub fn primary(&self) -> Relation {
        match self {
            PipelineKind::Conversations => Relation::Conversations,
            PipelineKind::Messages => Relation::Messages,
        }
    }

    /// Every relation this pipeline writes.
    pub fn relations(&self) -> &'static [Relation] {
        match self {
            PipelineKind::Conversations => &[Relation::Conversations, Relation::Participants],
            PipelineKind::Messages => &[
                Relation::Messages,
                Relation::MessagesBySender,
                Relation::MessageReactions,
                Relation::DeliveryReceipts,
                Relation::ReadReceipts,
            ],
        }
    }

    /// Relation routed through the latest-wins window, if any.
    pub fn windowed(&self) -> Option<Relation> {
        match self {
            PipelineKind::Conversations => None,
            PipelineKind::Messages => Some(Relation::ReadReceipts),
        }
    }

    /// Map one source document.
    pub fn map(&self, doc: &Document) -> MappedRecords {
        match self {
            PipelineKind::Conversations => map_conversation(doc),
            PipelineKind::Messages => map_message(doc),
        }
    }

    /// Source-side count strategy for a relation.
    pub fn source_count(&self, relation: Relation) -> SourceCount {
        match relation {
            Relation::Conversations | Relation::Messages | Relation::MessagesBySender => {
                SourceCount::Documents
            }
            Relation::Participants => SourceCount::Embedded("participants"),
            Relation::MessageReactions => SourceCount::Embedded("reactions"),
            Relation::DeliveryReceipts => SourceCount::Embedded("delivered_to"),
            Relation::ReadReceipts => SourceCount::Unchecked,
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PipelineKind {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "conversations" => Ok(PipelineKind::Conversations),
            "messages" => Ok(PipelineKind::Messages),
            other => Err(MigrateError::Config(format!(
                "Unknown pipeline '{}'. Valid values: conversations, messages",
                other
            ))),
        }
    }
}
