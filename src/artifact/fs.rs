//! Directory-backed artifact store.
//!
//! One namespace per athlete/config output directory. The current version of
//! each artifact sits at the directory root under its logical name
//! (`metrics_result.md`, `run_summary.json`, ...), superseded versions move
//! to `history/`, and a JSON manifest tracks producing runs and timestamps.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{names, Artifact, ArtifactStore};
use crate::error::{CoachError, Result};

const MANIFEST_FILE: &str = "manifest.json";
const HISTORY_DIR: &str = "history";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VersionMeta {
    produced_by: Uuid,
    created_at: DateTime<Utc>,
    version: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    artifacts: BTreeMap<String, Vec<VersionMeta>>,
}

pub struct FsArtifactStore {
    root: PathBuf,
    // Guards manifest read-modify-write cycles. Concurrent writers to the
    // same artifact name are a graph-construction contract violation, but
    // distinct names share the one manifest file.
    guard: Mutex<()>,
}

fn file_name(name: &str) -> String {
    match name {
        names::RUN_SUMMARY => format!("{name}.json"),
        names::TELEMETRY_CONTEXT | names::INTEGRATED_CONTEXT => format!("{name}.json"),
        _ => format!("{name}.md"),
    }
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn current_path(&self, name: &str) -> PathBuf {
        self.root.join(file_name(name))
    }

    fn history_path(&self, name: &str, version: u64) -> PathBuf {
        self.root
            .join(HISTORY_DIR)
            .join(format!("{name}.v{version}.{}", ext(name)))
    }

    async fn load_manifest(&self) -> Result<Manifest> {
        let path = self.root.join(MANIFEST_FILE);
        match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).map_err(|e| CoachError::Storage {
                message: format!("corrupt artifact manifest: {e}"),
                path: Some(path),
                source: Some(Box::new(e)),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Manifest::default()),
            Err(e) => Err(CoachError::Storage {
                message: format!("failed to read artifact manifest: {e}"),
                path: Some(path),
                source: Some(Box::new(e)),
            }),
        }
    }

    async fn save_manifest(&self, manifest: &Manifest) -> Result<()> {
        let path = self.root.join(MANIFEST_FILE);
        let content = serde_json::to_string_pretty(manifest)
            .map_err(|e| CoachError::storage_with("failed to encode manifest", e))?;
        fs::write(&path, content).await.map_err(|e| CoachError::Storage {
            message: format!("failed to write artifact manifest: {e}"),
            path: Some(path),
            source: Some(Box::new(e)),
        })
    }

    async fn read_payload(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).await.map_err(|e| CoachError::Storage {
            message: format!("failed to read artifact payload: {e}"),
            path: Some(path.to_path_buf()),
            source: Some(Box::new(e)),
        })
    }
}

fn ext(name: &str) -> &'static str {
    match name {
        names::RUN_SUMMARY | names::TELEMETRY_CONTEXT | names::INTEGRATED_CONTEXT => "json",
        _ => "md",
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn get(&self, name: &str) -> Result<Option<Artifact>> {
        let _lock = self.guard.lock().await;
        let manifest = self.load_manifest().await?;
        let Some(meta) = manifest.artifacts.get(name).and_then(|v| v.last()) else {
            return Ok(None);
        };
        let payload = self.read_payload(&self.current_path(name)).await?;
        Ok(Some(Artifact {
            name: name.to_string(),
            payload,
            produced_by: meta.produced_by,
            created_at: meta.created_at,
            version: meta.version,
        }))
    }

    async fn put(&self, name: &str, payload: &str, run_id: Uuid) -> Result<Artifact> {
        let _lock = self.guard.lock().await;
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CoachError::storage_with("failed to create artifact directory", e))?;

        let mut manifest = self.load_manifest().await?;
        let versions = manifest.artifacts.entry(name.to_string()).or_default();

        // Supersede: move the prior current version into history/.
        if let Some(prior) = versions.last() {
            let history_dir = self.root.join(HISTORY_DIR);
            fs::create_dir_all(&history_dir)
                .await
                .map_err(|e| CoachError::storage_with("failed to create history directory", e))?;
            fs::rename(
                self.current_path(name),
                self.history_path(name, prior.version),
            )
            .await
            .map_err(|e| CoachError::storage_with("failed to archive prior artifact", e))?;
        }

        let meta = VersionMeta {
            produced_by: run_id,
            created_at: Utc::now(),
            version: versions.len() as u64 + 1,
        };
        let current = self.current_path(name);
        fs::write(&current, payload).await.map_err(|e| CoachError::Storage {
            message: format!("failed to write artifact: {e}"),
            path: Some(current),
            source: Some(Box::new(e)),
        })?;

        versions.push(meta.clone());
        self.save_manifest(&manifest).await?;

        Ok(Artifact {
            name: name.to_string(),
            payload: payload.to_string(),
            produced_by: meta.produced_by,
            created_at: meta.created_at,
            version: meta.version,
        })
    }

    async fn history(&self, name: &str) -> Result<Vec<Artifact>> {
        let _lock = self.guard.lock().await;
        let manifest = self.load_manifest().await?;
        let Some(versions) = manifest.artifacts.get(name) else {
            return Ok(Vec::new());
        };

        let mut artifacts = Vec::with_capacity(versions.len());
        for meta in versions {
            let path = if meta.version == versions.len() as u64 {
                self.current_path(name)
            } else {
                self.history_path(name, meta.version)
            };
            artifacts.push(Artifact {
                name: name.to_string(),
                payload: self.read_payload(&path).await?,
                produced_by: meta.produced_by,
                created_at: meta.created_at,
                version: meta.version,
            });
        }
        Ok(artifacts)
    }
}
