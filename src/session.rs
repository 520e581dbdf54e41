use crate::ebay::TokenPair;
use crate::models::{
    EditRequest, FieldReport, GenerateResponse, ListingRecord, MIN_POSTAGE_WEIGHT_KG,
};
use crate::pipeline::generators::normalize_title;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_with::skip_serializing_none;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session id")]
    InvalidId,
    #[error("session not found")]
    NotFound,
    #[error("no listing has been generated in this session yet")]
    NothingGenerated,
}

/// Everything one interactive run accumulates: the generated record, user
/// edits, uploaded image URLs, and the marketplace token pair. Held only in
/// memory; a session dies with the process or an explicit reset.
#[derive(Debug, Clone)]
struct Session {
    record: Option<ListingRecord>,
    fields: Vec<FieldReport>,
    image_urls: Vec<String>,
    tokens: Option<TokenPair>,
    created_at: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        Self {
            record: None,
            fields: Vec::new(),
            image_urls: Vec::new(),
            tokens: None,
            created_at: Utc::now(),
        }
    }
}

/// Client-facing view of a session. Tokens are reduced to a boolean so they
/// never leave the process.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub record: Option<ListingRecord>,
    pub fields: Vec<FieldReport>,
    pub image_urls: Vec<String>,
    pub ebay_authenticated: bool,
}

/// Inputs the publisher needs, pulled from a session in one lock acquisition.
#[derive(Debug, Clone)]
pub struct PublishContext {
    pub record: Option<ListingRecord>,
    pub image_urls: Vec<String>,
    pub tokens: Option<TokenPair>,
}

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.lock().await.insert(id, Session::new());
        id
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.sessions.lock().await.contains_key(&id)
    }

    pub async fn snapshot(&self, id: Uuid) -> Option<SessionSnapshot> {
        let guard = self.sessions.lock().await;
        guard.get(&id).map(|session| SessionSnapshot {
            session_id: id.to_string(),
            created_at: session.created_at,
            record: session.record.clone(),
            fields: session.fields.clone(),
            image_urls: session.image_urls.clone(),
            ebay_authenticated: session.tokens.is_some(),
        })
    }

    pub async fn store_generated(&self, id: Uuid, outcome: &GenerateResponse) -> bool {
        let mut guard = self.sessions.lock().await;
        match guard.get_mut(&id) {
            Some(session) => {
                session.record = Some(outcome.record.clone());
                session.fields = outcome.fields.clone();
                true
            }
            None => false,
        }
    }

    /// Apply user edits over the generated record. Edits go through the same
    /// normalization as generation: titles are re-truncated and the weight is
    /// re-clamped, so the record invariants hold no matter who wrote the
    /// value last.
    pub async fn apply_edits(
        &self,
        id: Uuid,
        edits: &EditRequest,
    ) -> Result<ListingRecord, SessionError> {
        let mut guard = self.sessions.lock().await;
        let session = guard.get_mut(&id).ok_or(SessionError::NotFound)?;
        let record = session
            .record
            .as_mut()
            .ok_or(SessionError::NothingGenerated)?;

        if let Some(title) = &edits.title {
            record.title = normalize_title(title);
        }
        if let Some(description) = &edits.description {
            record.description = description.clone();
        }
        if let Some(weight) = edits.postage_weight {
            record.postage_weight = weight.max(MIN_POSTAGE_WEIGHT_KG);
        }

        Ok(record.clone())
    }

    pub async fn store_image_urls(&self, id: Uuid, urls: Vec<String>) -> bool {
        let mut guard = self.sessions.lock().await;
        match guard.get_mut(&id) {
            Some(session) => {
                session.image_urls = urls;
                true
            }
            None => false,
        }
    }

    pub async fn store_tokens(&self, id: Uuid, tokens: TokenPair) -> bool {
        let mut guard = self.sessions.lock().await;
        match guard.get_mut(&id) {
            Some(session) => {
                session.tokens = Some(tokens);
                true
            }
            None => false,
        }
    }

    pub async fn publish_context(&self, id: Uuid) -> Option<PublishContext> {
        let guard = self.sessions.lock().await;
        guard.get(&id).map(|session| PublishContext {
            record: session.record.clone(),
            image_urls: session.image_urls.clone(),
            tokens: session.tokens.clone(),
        })
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.lock().await.remove(&id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldStatus, ListingField};

    fn generated_outcome() -> GenerateResponse {
        GenerateResponse {
            record: ListingRecord {
                title: "Generated title".into(),
                description: "<p>Generated description</p>".into(),
                category: "Fashion > Men's Clothing > Coats & Jackets".into(),
                postage_weight: 1.2,
                suggested_price: None,
            },
            fields: vec![FieldReport {
                field: ListingField::Title,
                status: FieldStatus::Generated,
            }],
        }
    }

    #[tokio::test]
    async fn session_lifecycle_create_generate_reset() {
        let store = SessionStore::new();
        let id = store.create().await;
        assert!(store.contains(id).await);

        assert!(store.store_generated(id, &generated_outcome()).await);
        let snapshot = store.snapshot(id).await.expect("snapshot");
        assert_eq!(
            snapshot.record.as_ref().map(|r| r.title.as_str()),
            Some("Generated title")
        );
        assert!(!snapshot.ebay_authenticated);

        assert!(store.remove(id).await);
        assert!(!store.contains(id).await);
        assert!(store.snapshot(id).await.is_none());
    }

    #[tokio::test]
    async fn edits_are_renormalized() {
        let store = SessionStore::new();
        let id = store.create().await;
        store.store_generated(id, &generated_outcome()).await;

        let record = store
            .apply_edits(
                id,
                &EditRequest {
                    title: Some("x".repeat(120)),
                    description: None,
                    postage_weight: Some(0.01),
                },
            )
            .await
            .expect("edits");

        assert_eq!(record.title.chars().count(), 80);
        assert_eq!(record.postage_weight, MIN_POSTAGE_WEIGHT_KG);
        // untouched fields survive the edit
        assert_eq!(record.description, "<p>Generated description</p>");
    }

    #[tokio::test]
    async fn edit_before_generate_is_rejected() {
        let store = SessionStore::new();
        let id = store.create().await;

        let err = store
            .apply_edits(
                id,
                &EditRequest {
                    title: Some("new".into()),
                    description: None,
                    postage_weight: None,
                },
            )
            .await
            .expect_err("nothing generated yet");
        assert!(matches!(err, SessionError::NothingGenerated));
    }

    #[tokio::test]
    async fn tokens_flip_the_authenticated_flag() {
        let store = SessionStore::new();
        let id = store.create().await;
        store
            .store_tokens(
                id,
                TokenPair {
                    access_token: "access".into(),
                    refresh_token: Some("refresh".into()),
                },
            )
            .await;

        let snapshot = store.snapshot(id).await.expect("snapshot");
        assert!(snapshot.ebay_authenticated);

        let context = store.publish_context(id).await.expect("context");
        assert!(context.tokens.is_some());
        assert!(context.record.is_none());
    }
}
