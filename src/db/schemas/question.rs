//! Question document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::voting::Votable;

/// Collection name for questions
pub const QUESTION_COLLECTION: &str = "questions";

/// Question document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct QuestionDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub author_id: ObjectId,

    pub title: String,

    pub body: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Voters who upvoted; disjoint from `downvotes`
    #[serde(default)]
    pub upvotes: Vec<ObjectId>,

    #[serde(default)]
    pub downvotes: Vec<ObjectId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_answer_id: Option<ObjectId>,
}

impl QuestionDoc {
    pub fn new(author_id: ObjectId, title: String, body: String, tags: Vec<String>) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            author_id,
            title,
            body,
            tags,
            upvotes: Vec::new(),
            downvotes: Vec::new(),
            accepted_answer_id: None,
        }
    }
}

impl Votable for QuestionDoc {
    fn author_id(&self) -> ObjectId {
        self.author_id
    }

    fn upvotes(&self) -> &[ObjectId] {
        &self.upvotes
    }

    fn downvotes(&self) -> &[ObjectId] {
        &self.downvotes
    }

    fn vote_sets_mut(&mut self) -> (&mut Vec<ObjectId>, &mut Vec<ObjectId>) {
        (&mut self.upvotes, &mut self.downvotes)
    }
}

impl IntoIndexes for QuestionDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "author_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("author_id_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "tags": 1 },
                Some(IndexOptions::builder().name("tags_index".to_string()).build()),
            ),
            (
                doc! { "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("created_at_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for QuestionDoc {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
