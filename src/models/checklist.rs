//! Checklist template and case checklist item models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;
use crate::models::document::Document;
use crate::utils::helpers::leading_words;

/// Number of leading title words an unlinked document title has to contain
pub const TITLE_MATCH_WORDS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChecklistTemplate {
    pub id: Uuid,
    pub visa_type: String,
    pub title: String,
    pub description: Option<String>,
    pub required: bool,
    pub order_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CaseChecklistItem {
    pub id: Uuid,
    pub case_id: Uuid,
    pub template_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub required: bool,
    pub order_index: i32,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CaseChecklistItem {
    /// Whether a document counts as evidence for this item.
    ///
    /// Documents linked at upload time match only their own item. Unlinked
    /// documents fall back to a title match on the item's first words.
    pub fn is_satisfied_by(&self, document: &Document) -> bool {
        match document.checklist_item_id {
            Some(item_id) => item_id == self.id,
            None => title_matches(&self.title, &document.title),
        }
    }

    pub fn is_satisfied_by_any(&self, documents: &[Document]) -> bool {
        documents.iter().any(|document| self.is_satisfied_by(document))
    }
}

/// Case-insensitive containment of the item's leading words in a document title
pub fn title_matches(item_title: &str, document_title: &str) -> bool {
    let needle = leading_words(item_title, TITLE_MATCH_WORDS);
    if needle.is_empty() {
        return false;
    }
    document_title.to_lowercase().contains(&needle)
}
