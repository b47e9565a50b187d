//! Knowledge graph construction from an uploaded corpus.
//!
//! The builder chunks the corpus, asks the model to extract
//! `(subject, relation, object)` triples from each chunk, and writes the
//! graph and chunk files the retriever reads. A chunk whose extraction
//! fails is logged and skipped; construction only fails on I/O errors or
//! an unreadable corpus.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::events::ProgressPublisher;
use crate::llm::LLMClient;
use crate::retrieval::decomposer::strip_fences;
use crate::types::{AppError, Result};

/// Target chunk size in characters. Paragraphs are packed greedily up to
/// this limit; a single oversized paragraph becomes its own chunk.
const CHUNK_SIZE: usize = 800;

#[derive(Debug, Clone, Copy)]
pub struct BuildSummary {
    pub triples: usize,
    pub chunks: usize,
}

/// Turns a corpus file into graph and chunk artifacts.
#[async_trait]
pub trait GraphBuilder: Send + Sync {
    async fn build(
        &self,
        dataset: &str,
        corpus_path: &Path,
        schema_path: &Path,
        graph_path: &Path,
        chunks_path: &Path,
        publisher: &ProgressPublisher,
        client_id: &str,
    ) -> Result<BuildSummary>;
}

/// LLM-backed builder producing the relationship-list graph format.
pub struct LlmGraphBuilder {
    llm: Arc<dyn LLMClient>,
}

#[derive(Debug, Deserialize)]
struct ExtractedTriple {
    subject: String,
    relation: String,
    object: String,
    #[serde(default)]
    subject_type: Option<String>,
    #[serde(default)]
    object_type: Option<String>,
}

impl LlmGraphBuilder {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }

    fn extraction_prompt(schema: &str, chunk: &str) -> String {
        format!(
            "Extract knowledge triples from the following text. \
             Use the node and relation types from this schema where they apply:\n{}\n\n\
             Text:\n{}\n\n\
             Return ONLY a JSON array of objects with keys \"subject\", \"relation\", \
             \"object\" and optionally \"subject_type\" and \"object_type\". \
             Return [] if the text contains no factual statements.",
            schema, chunk
        )
    }

    async fn extract_triples(&self, schema: &str, chunk: &str) -> Result<Vec<ExtractedTriple>> {
        let response = self
            .llm
            .generate(&Self::extraction_prompt(schema, chunk))
            .await?;
        serde_json::from_str(strip_fences(&response))
            .map_err(|e| AppError::Llm(format!("Unparseable extraction: {}", e)))
    }
}

fn node_value(name: &str, schema_type: Option<&str>, chunk_id: usize) -> Value {
    let mut properties = json!({
        "name": name,
        "chunk id": chunk_id.to_string()
    });
    if let Some(t) = schema_type {
        properties["schema_type"] = json!(t);
    }
    json!({"label": "entity", "properties": properties})
}

/// Read a corpus file into `(title, text)` documents. Accepts an array of
/// objects (`text` or `content` field), an array of strings, or a single
/// object of either shape.
pub fn load_corpus(corpus: &Value) -> Result<Vec<(String, String)>> {
    fn one(idx: usize, item: &Value) -> Option<(String, String)> {
        match item {
            Value::String(s) => Some((format!("doc_{}", idx), s.clone())),
            Value::Object(obj) => {
                let text = obj
                    .get("text")
                    .or_else(|| obj.get("content"))
                    .and_then(Value::as_str)?;
                let title = obj
                    .get("title")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("doc_{}", idx));
                Some((title, text.to_string()))
            }
            _ => None,
        }
    }

    let docs: Vec<(String, String)> = match corpus {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| one(i, item))
            .collect(),
        other => one(0, other).into_iter().collect(),
    };

    if docs.is_empty() {
        return Err(AppError::InvalidInput(
            "Corpus contains no readable documents".to_string(),
        ));
    }
    Ok(docs)
}

/// Greedy paragraph packing up to [`CHUNK_SIZE`] characters.
pub fn chunk_text(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if !current.is_empty() && current.chars().count() + paragraph.chars().count() > CHUNK_SIZE {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
        if current.chars().count() > CHUNK_SIZE {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl GraphBuilder for LlmGraphBuilder {
    async fn build(
        &self,
        dataset: &str,
        corpus_path: &Path,
        schema_path: &Path,
        graph_path: &Path,
        chunks_path: &Path,
        publisher: &ProgressPublisher,
        client_id: &str,
    ) -> Result<BuildSummary> {
        let corpus_raw = tokio::fs::read_to_string(corpus_path).await?;
        let corpus: Value = serde_json::from_str(&corpus_raw)?;
        let docs = load_corpus(&corpus)?;
        let schema = tokio::fs::read_to_string(schema_path)
            .await
            .unwrap_or_default();

        let chunks: Vec<String> = docs
            .iter()
            .flat_map(|(_, text)| chunk_text(text))
            .collect();
        let total = chunks.len().max(1);

        publisher.send_progress(
            client_id,
            "construction",
            10,
            &format!("Chunked corpus into {} pieces", chunks.len()),
        );

        let mut relationships: Vec<Value> = Vec::new();
        let mut chunk_lines: Vec<String> = Vec::new();

        for (chunk_id, chunk) in chunks.iter().enumerate() {
            chunk_lines.push(serde_json::to_string(&json!({
                "id": chunk_id.to_string(),
                "text": chunk
            }))?);

            match self.extract_triples(&schema, chunk).await {
                Ok(triples) => {
                    for t in triples {
                        if t.subject.is_empty() || t.relation.is_empty() || t.object.is_empty() {
                            continue;
                        }
                        relationships.push(json!({
                            "start_node": node_value(&t.subject, t.subject_type.as_deref(), chunk_id),
                            "end_node": node_value(&t.object, t.object_type.as_deref(), chunk_id),
                            "relation": t.relation
                        }));
                    }
                }
                Err(e) => {
                    warn!(dataset, chunk_id, error = %e, "triple extraction failed, skipping chunk");
                }
            }

            let progress = (10 + (chunk_id + 1) * 80 / total).min(90) as u8;
            publisher.send_progress(
                client_id,
                "construction",
                progress,
                &format!("Processed chunk {}/{}", chunk_id + 1, chunks.len()),
            );
            tokio::task::yield_now().await;
        }

        if let Some(parent) = graph_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if let Some(parent) = chunks_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(graph_path, serde_json::to_string_pretty(&relationships)?).await?;
        tokio::fs::write(chunks_path, chunk_lines.join("\n")).await?;

        info!(
            dataset,
            triples = relationships.len(),
            chunks = chunk_lines.len(),
            "graph construction finished"
        );

        Ok(BuildSummary {
            triples: relationships.len(),
            chunks: chunk_lines.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct ScriptedLlm {
        response: String,
    }

    #[async_trait]
    impl LLMClient for ScriptedLlm {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.response.clone())
        }

        async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
            self.generate(prompt).await
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LLMClient for FailingLlm {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(AppError::Llm("model offline".to_string()))
        }

        async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
            self.generate(prompt).await
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn chunking_packs_paragraphs() {
        let text = "first paragraph\n\nsecond paragraph";
        assert_eq!(chunk_text(text), vec!["first paragraph\n\nsecond paragraph"]);

        let long = format!("{}\n\n{}", "a".repeat(700), "b".repeat(700));
        let chunks = chunk_text(&long);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn chunking_skips_blank_paragraphs() {
        assert!(chunk_text("\n\n  \n\n").is_empty());
    }

    #[test]
    fn corpus_accepts_object_and_string_documents() {
        let corpus = json!([
            {"title": "Doc", "text": "hello"},
            "bare string",
            {"content": "alt field"}
        ]);
        let docs = load_corpus(&corpus).unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0], ("Doc".to_string(), "hello".to_string()));
        assert_eq!(docs[1].1, "bare string");
        assert_eq!(docs[2].1, "alt field");
    }

    #[test]
    fn empty_corpus_is_invalid_input() {
        assert!(matches!(
            load_corpus(&json!([])),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            load_corpus(&json!(42)),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn build_writes_graph_and_chunk_files() {
        let dir = TempDir::new().unwrap();
        let corpus_path = dir.path().join("corpus.json");
        let schema_path = dir.path().join("schema.json");
        let graph_path = dir.path().join("out/demo_new.json");
        let chunks_path = dir.path().join("out/demo.jsonl");

        std::fs::write(
            &corpus_path,
            r#"[{"title": "T", "text": "The Eiffel Tower is in Paris."}]"#,
        )
        .unwrap();
        std::fs::write(&schema_path, "{}").unwrap();

        let llm = Arc::new(ScriptedLlm {
            response: r#"```json
[{"subject": "Eiffel Tower", "relation": "located_in", "object": "Paris", "subject_type": "landmark"}]
```"#
                .to_string(),
        });
        let builder = LlmGraphBuilder::new(llm);
        let publisher = ProgressPublisher::default();

        let summary = builder
            .build(
                "demo",
                &corpus_path,
                &schema_path,
                &graph_path,
                &chunks_path,
                &publisher,
                "client-1",
            )
            .await
            .unwrap();

        assert_eq!(summary.triples, 1);
        assert_eq!(summary.chunks, 1);

        let graph: Value =
            serde_json::from_str(&std::fs::read_to_string(&graph_path).unwrap()).unwrap();
        assert_eq!(graph[0]["relation"], "located_in");
        assert_eq!(graph[0]["start_node"]["properties"]["name"], "Eiffel Tower");
        assert_eq!(
            graph[0]["start_node"]["properties"]["schema_type"],
            "landmark"
        );

        let chunks_raw = std::fs::read_to_string(&chunks_path).unwrap();
        let first: Value = serde_json::from_str(chunks_raw.lines().next().unwrap()).unwrap();
        assert_eq!(first["id"], "0");
    }

    #[tokio::test]
    async fn failed_extraction_skips_chunk_but_still_writes_artifacts() {
        let dir = TempDir::new().unwrap();
        let corpus_path = dir.path().join("corpus.json");
        let graph_path = dir.path().join("g.json");
        let chunks_path = dir.path().join("c.jsonl");
        std::fs::write(&corpus_path, r#"[{"text": "some text"}]"#).unwrap();

        let builder = LlmGraphBuilder::new(Arc::new(FailingLlm));
        let publisher = ProgressPublisher::default();
        let summary = builder
            .build(
                "demo",
                &corpus_path,
                dir.path().join("missing-schema.json").as_path(),
                &graph_path,
                &chunks_path,
                &publisher,
                "client-1",
            )
            .await
            .unwrap();

        assert_eq!(summary.triples, 0);
        assert_eq!(summary.chunks, 1);
        assert!(graph_path.exists());
    }
}
