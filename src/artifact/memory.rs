//! In-memory artifact store backing unit and integration tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Artifact, ArtifactStore};
use crate::error::Result;

#[derive(Default)]
pub struct MemoryArtifactStore {
    versions: Mutex<HashMap<String, Vec<Artifact>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn get(&self, name: &str) -> Result<Option<Artifact>> {
        let versions = self.versions.lock().await;
        Ok(versions.get(name).and_then(|v| v.last().cloned()))
    }

    async fn put(&self, name: &str, payload: &str, run_id: Uuid) -> Result<Artifact> {
        let mut versions = self.versions.lock().await;
        let entry = versions.entry(name.to_string()).or_default();
        let artifact = Artifact {
            name: name.to_string(),
            payload: payload.to_string(),
            produced_by: run_id,
            created_at: Utc::now(),
            version: entry.len() as u64 + 1,
        };
        entry.push(artifact.clone());
        Ok(artifact)
    }

    async fn history(&self, name: &str) -> Result<Vec<Artifact>> {
        let versions = self.versions.lock().await;
        Ok(versions.get(name).cloned().unwrap_or_default())
    }
}
