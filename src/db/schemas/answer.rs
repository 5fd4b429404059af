//! Answer document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::voting::Votable;

/// Collection name for answers
pub const ANSWER_COLLECTION: &str = "answers";

/// Answer document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AnswerDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub question_id: ObjectId,

    pub author_id: ObjectId,

    pub body: String,

    #[serde(default)]
    pub upvotes: Vec<ObjectId>,

    #[serde(default)]
    pub downvotes: Vec<ObjectId>,

    #[serde(default)]
    pub is_accepted: bool,
}

impl AnswerDoc {
    pub fn new(question_id: ObjectId, author_id: ObjectId, body: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            question_id,
            author_id,
            body,
            upvotes: Vec::new(),
            downvotes: Vec::new(),
            is_accepted: false,
        }
    }
}

impl Votable for AnswerDoc {
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

impl IntoIndexes for AnswerDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "question_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("question_id_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "author_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("author_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for AnswerDoc {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
