//! Document metadata lookup used to hydrate source display fields

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub document_id: String,
    pub title: Option<String>,
    pub filename: Option<String>,
    /// ISO-8601 date of the document
    pub document_date: Option<String>,
    pub doc_type: Option<String>,
}

impl DocumentMetadata {
    /// Best human-readable label: title, then filename
    pub fn display_name(&self) -> Option<&str> {
        self.title.as_deref().or(self.filename.as_deref())
    }
}

#[async_trait]
pub trait DocumentMetadataCache: Send + Sync {
    async fn lookup(&self, document_id: &str) -> Option<DocumentMetadata>;
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentCache {
    documents: DashMap<String, DocumentMetadata>,
}

impl InMemoryDocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, metadata: DocumentMetadata) {
        self.documents.insert(metadata.document_id.clone(), metadata);
    }
}

#[async_trait]
impl DocumentMetadataCache for InMemoryDocumentCache {
    async fn lookup(&self, document_id: &str) -> Option<DocumentMetadata> {
        self.documents.get(document_id).map(|d| d.value().clone())
    }
}
