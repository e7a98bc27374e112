//! In-memory collaborator implementations for tests and local runs.

use crate::external::{
    AccessChecker, AuditSink, DocumentProvider, HouseholdProvider, ThumbnailAccessEvent,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thumbly_core::models::{Document, Household};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Document provider backed by a HashMap.
#[derive(Default, Clone)]
pub struct InMemoryDocuments {
    documents: Arc<Mutex<HashMap<Uuid, Document>>>,
}

impl InMemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, document: Document) {
        self.documents.lock().await.insert(document.id, document);
    }
}

#[async_trait]
impl DocumentProvider for InMemoryDocuments {
    async fn get_document(&self, document_id: Uuid) -> anyhow::Result<Option<Document>> {
        Ok(self.documents.lock().await.get(&document_id).cloned())
    }
}

/// Access checker backed by an allow-list of (user, document) grants.
#[derive(Default, Clone)]
pub struct AllowListAccess {
    grants: Arc<Mutex<HashSet<(Uuid, Uuid)>>>,
}

impl AllowListAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn grant(&self, user_id: Uuid, document_id: Uuid) {
        self.grants.lock().await.insert((user_id, document_id));
    }

    pub async fn revoke(&self, user_id: Uuid, document_id: Uuid) {
        self.grants.lock().await.remove(&(user_id, document_id));
    }
}

#[async_trait]
impl AccessChecker for AllowListAccess {
    async fn can_access_document(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> anyhow::Result<bool> {
        Ok(self.grants.lock().await.contains(&(user_id, document_id)))
    }
}

/// Access checker whose lookups always fail, for exercising the
/// fail-closed path.
pub struct ErroringAccess;

#[async_trait]
impl AccessChecker for ErroringAccess {
    async fn can_access_document(
        &self,
        _user_id: Uuid,
        _document_id: Uuid,
    ) -> anyhow::Result<bool> {
        Err(anyhow::anyhow!("authorization service unavailable"))
    }
}

/// Household directory backed by a user-to-household map.
#[derive(Default, Clone)]
pub struct StaticHouseholds {
    memberships: Arc<Mutex<HashMap<Uuid, Household>>>,
}

impl StaticHouseholds {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn assign(&self, user_id: Uuid, household: Household) {
        self.memberships.lock().await.insert(user_id, household);
    }
}

#[async_trait]
impl HouseholdProvider for StaticHouseholds {
    async fn get_user_household(&self, user_id: Uuid) -> anyhow::Result<Option<Household>> {
        Ok(self.memberships.lock().await.get(&user_id).cloned())
    }
}

/// Audit sink that captures events for assertions.
#[derive(Default, Clone)]
pub struct RecordingAuditSink {
    events: Arc<Mutex<Vec<ThumbnailAccessEvent>>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ThumbnailAccessEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, event: ThumbnailAccessEvent) -> anyhow::Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
