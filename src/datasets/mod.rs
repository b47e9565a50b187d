//! Dataset, schema and graph-artifact file management.
//!
//! Layout mirrors the server's working directory:
//! `data/uploaded/{name}/corpus.json`, `output/graphs/{name}_new.json`,
//! `output/chunks/{name}.jsonl`, `schemas/{name}.json`. The `demo` dataset
//! is read-only: it cannot be deleted and cannot carry a custom schema.

use crate::types::{AppError, DatasetInfo, Result};
use crate::utils::config::PathsConfig;
use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};

pub const DEMO_DATASET: &str = "demo";

/// Text extraction for non-text upload formats (PDF and friends).
///
/// Optional collaborator: when absent or failing, the upload pipeline
/// stores the document with empty text rather than rejecting it.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String>;
}

#[derive(Clone)]
pub struct DatasetStore {
    paths: PathsConfig,
}

impl DatasetStore {
    pub fn new(paths: PathsConfig) -> Self {
        Self { paths }
    }

    /// Create the working directories. Called once at startup.
    pub async fn ensure_layout(&self) -> Result<()> {
        for dir in [
            &self.paths.upload_dir,
            &self.paths.graphs_dir,
            &self.paths.chunks_dir,
            &self.paths.schemas_dir,
        ] {
            tokio::fs::create_dir_all(dir).await?;
        }
        self.ensure_demo_schema().await?;
        Ok(())
    }

    // ============= Paths =============

    pub fn dataset_dir(&self, name: &str) -> PathBuf {
        self.paths.upload_dir.join(name)
    }

    pub fn corpus_path(&self, name: &str) -> PathBuf {
        if name == DEMO_DATASET {
            self.paths.demo_dir.join("demo_corpus.json")
        } else {
            self.dataset_dir(name).join("corpus.json")
        }
    }

    pub fn graph_path(&self, name: &str) -> PathBuf {
        self.paths.graphs_dir.join(format!("{}_new.json", name))
    }

    pub fn chunks_path(&self, name: &str) -> PathBuf {
        self.paths.chunks_dir.join(format!("{}.jsonl", name))
    }

    pub fn schema_path(&self, name: &str) -> PathBuf {
        self.paths.schemas_dir.join(format!("{}.json", name))
    }

    /// Corpus for the dataset, falling back to the demo corpus.
    pub fn resolve_corpus(&self, name: &str) -> Option<PathBuf> {
        let path = self.corpus_path(name);
        if path.exists() {
            return Some(path);
        }
        let demo = self.corpus_path(DEMO_DATASET);
        demo.exists().then_some(demo)
    }

    /// Graph for the dataset, falling back to the demo graph.
    pub fn resolve_graph(&self, name: &str) -> Option<PathBuf> {
        let path = self.graph_path(name);
        if path.exists() {
            return Some(path);
        }
        let demo = self.graph_path(DEMO_DATASET);
        demo.exists().then_some(demo)
    }

    /// Dataset-specific schema if present, otherwise the demo schema
    /// (provisioned on demand).
    pub async fn resolve_schema(&self, name: &str) -> Result<PathBuf> {
        if name != DEMO_DATASET {
            let path = self.schema_path(name);
            if path.exists() {
                return Ok(path);
            }
        }
        self.ensure_demo_schema().await
    }

    // ============= Demo schema =============

    /// Write the default demo schema if it does not exist yet.
    pub async fn ensure_demo_schema(&self) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.paths.schemas_dir).await?;
        let path = self.schema_path(DEMO_DATASET);
        if !path.exists() {
            let schema = json!({
                "Nodes": [
                    "person", "location", "organization", "event", "object",
                    "concept", "time_period", "creative_work",
                    "biological_entity", "natural_phenomenon"
                ],
                "Relations": [
                    "is_a", "part_of", "located_in", "created_by", "used_by",
                    "participates_in", "related_to", "belongs_to",
                    "influences", "precedes", "arrives_in", "comparable_to"
                ],
                "Attributes": [
                    "name", "date", "size", "type", "description", "status",
                    "quantity", "value", "position", "duration", "time"
                ]
            });
            tokio::fs::write(&path, serde_json::to_vec_pretty(&schema)?).await?;
        }
        Ok(path)
    }

    // ============= Dataset naming =============

    /// Filesystem-safe dataset name derived from an uploaded filename,
    /// suffixed with a counter when the name is already taken.
    pub fn unique_dataset_name(&self, filename: &str) -> String {
        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename);
        let mut base: String = stem
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
            .collect::<String>()
            .trim()
            .replace(' ', "_");
        if base.is_empty() {
            base = "dataset".to_string();
        }

        let mut name = base.clone();
        let mut counter = 1;
        while self.dataset_dir(&name).exists() {
            name = format!("{}_{}", base, counter);
            counter += 1;
        }
        name
    }

    // ============= Listing / deletion =============

    /// Uploaded datasets plus `demo` when its corpus exists, with
    /// ready/needs_construction status.
    pub async fn list_datasets(&self) -> Result<Vec<DatasetInfo>> {
        let mut datasets = Vec::new();

        if self.paths.upload_dir.exists() {
            let mut entries = tokio::fs::read_dir(&self.paths.upload_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if !entry.file_type().await?.is_dir() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                if !self.corpus_path(&name).exists() {
                    continue;
                }
                let status = if self.graph_path(&name).exists() {
                    "ready"
                } else {
                    "needs_construction"
                };
                datasets.push(DatasetInfo {
                    has_custom_schema: self.schema_path(&name).exists(),
                    name,
                    kind: "uploaded".to_string(),
                    status: status.to_string(),
                });
            }
        }

        if self.corpus_path(DEMO_DATASET).exists() {
            let status = if self.graph_path(DEMO_DATASET).exists() {
                "ready"
            } else {
                "needs_construction"
            };
            datasets.push(DatasetInfo {
                name: DEMO_DATASET.to_string(),
                kind: "demo".to_string(),
                status: status.to_string(),
                has_custom_schema: false,
            });
        }

        Ok(datasets)
    }

    /// Delete a dataset and every associated artifact. Returns the paths
    /// actually removed.
    pub async fn delete_dataset(&self, name: &str) -> Result<Vec<String>> {
        if name == DEMO_DATASET {
            return Err(AppError::InvalidInput(
                "Cannot delete demo dataset".to_string(),
            ));
        }

        let mut deleted = Vec::new();
        let dir = self.dataset_dir(name);
        if dir.exists() {
            tokio::fs::remove_dir_all(&dir).await?;
            deleted.push(dir.display().to_string());
        }
        for path in [
            self.graph_path(name),
            self.schema_path(name),
            self.chunks_path(name),
        ] {
            if path.exists() {
                tokio::fs::remove_file(&path).await?;
                deleted.push(path.display().to_string());
            }
        }
        Ok(deleted)
    }

    /// Remove stale construction artifacts before a (re)build. Failures
    /// are logged and ignored; a missing artifact is not an error.
    pub async fn clear_artifacts(&self, name: &str) {
        for path in [self.graph_path(name), self.chunks_path(name)] {
            if path.exists() {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    tracing::warn!("Failed to clear {}: {}", path.display(), e);
                } else {
                    tracing::info!("Cleared artifact: {}", path.display());
                }
            }
        }
    }

    /// Persist an uploaded custom schema for a dataset.
    pub async fn save_schema(&self, name: &str, schema: &serde_json::Value) -> Result<()> {
        if name == DEMO_DATASET {
            return Err(AppError::InvalidInput(
                "Cannot upload schema for demo dataset".to_string(),
            ));
        }
        if !schema.is_object() {
            return Err(AppError::InvalidInput(
                "Schema JSON must be an object".to_string(),
            ));
        }
        tokio::fs::create_dir_all(&self.paths.schemas_dir).await?;
        tokio::fs::write(self.schema_path(name), serde_json::to_vec_pretty(schema)?).await?;
        Ok(())
    }

    /// Write the normalized corpus for a freshly uploaded dataset.
    pub async fn write_corpus(&self, name: &str, corpus: &[serde_json::Value]) -> Result<()> {
        let dir = self.dataset_dir(name);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(
            dir.join("corpus.json"),
            serde_json::to_vec_pretty(&corpus)?,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(root: &TempDir) -> DatasetStore {
        let base = root.path();
        DatasetStore::new(PathsConfig {
            upload_dir: base.join("data/uploaded"),
            demo_dir: base.join("data/demo"),
            graphs_dir: base.join("output/graphs"),
            chunks_dir: base.join("output/chunks"),
            schemas_dir: base.join("schemas"),
            assets_dir: base.join("assets"),
        })
    }

    #[tokio::test]
    async fn layout_and_demo_schema_are_provisioned() {
        let root = TempDir::new().unwrap();
        let store = store(&root);
        store.ensure_layout().await.unwrap();
        let schema_path = store.schema_path(DEMO_DATASET);
        assert!(schema_path.exists());
        let raw = std::fs::read_to_string(schema_path).unwrap();
        let schema: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(schema["Relations"]
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r == "located_in"));
    }

    #[tokio::test]
    async fn unique_names_are_sanitized_and_deduplicated() {
        let root = TempDir::new().unwrap();
        let store = store(&root);
        store.ensure_layout().await.unwrap();

        let name = store.unique_dataset_name("My Report (final).txt");
        assert_eq!(name, "My_Report_final");

        store.write_corpus(&name, &[]).await.unwrap();
        let second = store.unique_dataset_name("My Report (final).txt");
        assert_eq!(second, "My_Report_final_1");
    }

    #[tokio::test]
    async fn listing_reflects_graph_status_and_custom_schema() {
        let root = TempDir::new().unwrap();
        let store = store(&root);
        store.ensure_layout().await.unwrap();

        store
            .write_corpus("alpha", &[serde_json::json!({"title": "t", "text": "x"})])
            .await
            .unwrap();
        let listed = store.list_datasets().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, "needs_construction");
        assert!(!listed[0].has_custom_schema);

        tokio::fs::write(store.graph_path("alpha"), "[]").await.unwrap();
        store
            .save_schema("alpha", &serde_json::json!({"Nodes": []}))
            .await
            .unwrap();
        let listed = store.list_datasets().await.unwrap();
        assert_eq!(listed[0].status, "ready");
        assert!(listed[0].has_custom_schema);
    }

    #[tokio::test]
    async fn demo_dataset_is_protected() {
        let root = TempDir::new().unwrap();
        let store = store(&root);
        store.ensure_layout().await.unwrap();

        assert!(store.delete_dataset(DEMO_DATASET).await.is_err());
        assert!(store
            .save_schema(DEMO_DATASET, &serde_json::json!({}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn delete_removes_all_artifacts() {
        let root = TempDir::new().unwrap();
        let store = store(&root);
        store.ensure_layout().await.unwrap();

        store.write_corpus("beta", &[]).await.unwrap();
        tokio::fs::write(store.graph_path("beta"), "[]").await.unwrap();
        tokio::fs::write(store.chunks_path("beta"), "").await.unwrap();

        let deleted = store.delete_dataset("beta").await.unwrap();
        assert_eq!(deleted.len(), 3);
        assert!(store.list_datasets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn schema_resolution_prefers_dataset_specific() {
        let root = TempDir::new().unwrap();
        let store = store(&root);
        store.ensure_layout().await.unwrap();

        let resolved = store.resolve_schema("gamma").await.unwrap();
        assert_eq!(resolved, store.schema_path(DEMO_DATASET));

        store
            .save_schema("gamma", &serde_json::json!({"Nodes": ["x"]}))
            .await
            .unwrap();
        let resolved = store.resolve_schema("gamma").await.unwrap();
        assert_eq!(resolved, store.schema_path("gamma"));
    }
}
