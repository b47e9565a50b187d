//! Graph-backed retriever.
//!
//! Loads a dataset's constructed graph (triples) and chunk artifacts into
//! an in-memory index, scores them lexically against queries, and hosts
//! the reasoning-model invocation point (`generate_prompt` /
//! `generate_answer`).

use crate::llm::LLMClient;
use crate::retrieval::{ChunkContents, InvolvedTypes, RetrievalResult};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Retrieval collaborator consumed by the orchestrator.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Load indices. Must be safely callable before first use and
    /// idempotent under redundant invocation.
    async fn build_indices(&self) -> Result<()>;

    /// One retrieval round. `involved_types` biases scoring when present
    /// (sub-question rounds); IRCoT refinement rounds pass `None`.
    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        involved_types: Option<&InvolvedTypes>,
    ) -> Result<(RetrievalResult, Duration)>;

    /// Compose the answer prompt for a question over an aggregated context.
    fn generate_prompt(&self, question: &str, context: &str) -> String;

    /// The sole reasoning-model call. Fails with `AppError::Llm`.
    async fn generate_answer(&self, prompt: &str) -> Result<String>;
}

struct TripleEntry {
    raw: String,
    tokens: HashSet<String>,
    relation_tokens: HashSet<String>,
}

struct ChunkEntry {
    id: String,
    text: String,
    tokens: HashSet<String>,
}

struct GraphIndex {
    triples: Vec<TripleEntry>,
    chunks: Vec<ChunkEntry>,
}

/// Lexical retriever over a constructed graph file and its chunk artifact.
pub struct GraphRetriever {
    graph_path: PathBuf,
    chunks_path: PathBuf,
    llm: Arc<dyn LLMClient>,
    index: RwLock<Option<Arc<GraphIndex>>>,
}

impl GraphRetriever {
    pub fn new(graph_path: PathBuf, chunks_path: PathBuf, llm: Arc<dyn LLMClient>) -> Self {
        Self {
            graph_path,
            chunks_path,
            llm,
            index: RwLock::new(None),
        }
    }

    fn load_index(graph_raw: &str, chunks_raw: Option<&str>) -> Result<GraphIndex> {
        let graph: Value = serde_json::from_str(graph_raw)
            .map_err(|e| AppError::Retrieval(format!("Invalid graph file: {}", e)))?;

        let mut triples = Vec::new();
        match &graph {
            // Relationship-list format produced by the graph builder.
            Value::Array(items) => {
                for item in items {
                    let subject = node_name(item.get("start_node"));
                    let object = node_name(item.get("end_node"));
                    let relation = item
                        .get("relation")
                        .and_then(Value::as_str)
                        .unwrap_or("related_to");
                    if let (Some(subject), Some(object)) = (subject, object) {
                        triples.push(make_triple(&subject, relation, &object));
                    }
                }
            }
            // Standard {nodes, edges} format.
            Value::Object(map) if map.contains_key("edges") => {
                if let Some(edges) = map.get("edges").and_then(Value::as_array) {
                    for edge in edges {
                        let source = edge.get("source").and_then(Value::as_str);
                        let target = edge.get("target").and_then(Value::as_str);
                        let relation = edge
                            .get("relation")
                            .and_then(Value::as_str)
                            .unwrap_or("related_to");
                        if let (Some(source), Some(target)) = (source, target) {
                            triples.push(make_triple(source, relation, target));
                        }
                    }
                }
            }
            _ => {
                return Err(AppError::Retrieval(
                    "Unrecognized graph file format".to_string(),
                ))
            }
        }

        let mut chunks = Vec::new();
        if let Some(raw) = chunks_raw {
            for line in raw.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<Value>(line) {
                    Ok(entry) => {
                        let id = entry
                            .get("id")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        let text = entry
                            .get("text")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        if !id.is_empty() {
                            chunks.push(ChunkEntry {
                                tokens: tokenize(&text),
                                id,
                                text,
                            });
                        }
                    }
                    Err(e) => tracing::warn!("Skipping malformed chunk line: {}", e),
                }
            }
        }

        Ok(GraphIndex { triples, chunks })
    }

    fn current_index(&self) -> Result<Arc<GraphIndex>> {
        self.index.read().clone().ok_or_else(|| {
            AppError::Retrieval("Indices not built; call build_indices first".to_string())
        })
    }
}

fn make_triple(subject: &str, relation: &str, object: &str) -> TripleEntry {
    let raw = format!("('{}', '{}', '{}')", subject, relation, object);
    let mut tokens = tokenize(subject);
    tokens.extend(tokenize(relation));
    tokens.extend(tokenize(object));
    TripleEntry {
        raw,
        tokens,
        relation_tokens: tokenize(relation),
    }
}

/// Best-effort display name for a relationship-list node.
fn node_name(node: Option<&Value>) -> Option<String> {
    let node = node?;
    let props = node.get("properties");
    for key in ["name", "summary", "caption", "schema_type"] {
        if let Some(v) = props.and_then(|p| p.get(key)) {
            match v {
                Value::String(s) if !s.is_empty() => return Some(s.clone()),
                Value::String(_) | Value::Null => continue,
                other => return Some(other.to_string()),
            }
        }
    }
    node.get("label")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_string())
        .collect()
}

fn overlap(a: &HashSet<String>, b: &HashSet<String>) -> usize {
    if a.len() <= b.len() {
        a.iter().filter(|t| b.contains(*t)).count()
    } else {
        b.iter().filter(|t| a.contains(*t)).count()
    }
}

#[async_trait]
impl Retriever for GraphRetriever {
    async fn build_indices(&self) -> Result<()> {
        let graph_raw = tokio::fs::read_to_string(&self.graph_path)
            .await
            .map_err(|e| {
                AppError::Retrieval(format!(
                    "Cannot read graph {}: {}",
                    self.graph_path.display(),
                    e
                ))
            })?;
        // Chunk artifact is optional; a graph-only dataset still retrieves.
        let chunks_raw = tokio::fs::read_to_string(&self.chunks_path).await.ok();

        let index = tokio::task::spawn_blocking(move || {
            Self::load_index(&graph_raw, chunks_raw.as_deref())
        })
        .await
        .map_err(|e| AppError::Internal(format!("Index build task failed: {}", e)))??;

        tracing::info!(
            triples = index.triples.len(),
            chunks = index.chunks.len(),
            "Built retrieval indices"
        );
        *self.index.write() = Some(Arc::new(index));
        Ok(())
    }

    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        involved_types: Option<&InvolvedTypes>,
    ) -> Result<(RetrievalResult, Duration)> {
        let start = Instant::now();
        let index = self.current_index()?;
        let query_tokens = tokenize(query);

        let hint_tokens: HashSet<String> = involved_types
            .filter(|t| !t.is_empty())
            .map(|t| {
                t.nodes
                    .iter()
                    .chain(t.relations.iter())
                    .chain(t.attributes.iter())
                    .flat_map(|s| tokenize(s))
                    .collect()
            })
            .unwrap_or_default();

        // Scoring walks the full index; keep it off the async workers.
        let result = tokio::task::spawn_blocking(move || {
            let mut scored: Vec<(usize, &TripleEntry)> = index
                .triples
                .iter()
                .filter_map(|t| {
                    let mut score = overlap(&query_tokens, &t.tokens) * 2;
                    if !hint_tokens.is_empty() && overlap(&hint_tokens, &t.relation_tokens) > 0 {
                        score += 1;
                    }
                    (score > 0).then_some((score, t))
                })
                .collect();
            scored.sort_by(|a, b| b.0.cmp(&a.0));
            let triples: Vec<String> = scored
                .into_iter()
                .take(top_k)
                .map(|(_, t)| t.raw.clone())
                .collect();

            let mut scored_chunks: Vec<(usize, &ChunkEntry)> = index
                .chunks
                .iter()
                .filter_map(|c| {
                    let score = overlap(&query_tokens, &c.tokens);
                    (score > 0).then_some((score, c))
                })
                .collect();
            scored_chunks.sort_by(|a, b| b.0.cmp(&a.0));

            let mut chunk_ids = Vec::new();
            let mut chunk_contents = HashMap::new();
            for (_, chunk) in scored_chunks.into_iter().take(top_k) {
                chunk_ids.push(chunk.id.clone());
                chunk_contents.insert(chunk.id.clone(), chunk.text.clone());
            }

            RetrievalResult {
                triples,
                chunk_ids,
                chunk_contents: ChunkContents::Mapped(chunk_contents),
            }
        })
        .await
        .map_err(|e| AppError::Internal(format!("Retrieval task failed: {}", e)))?;

        Ok((result, start.elapsed()))
    }

    fn generate_prompt(&self, question: &str, context: &str) -> String {
        format!(
            r#"You are a knowledgeable assistant answering questions over a knowledge graph.

Question: {question}

Retrieved knowledge:
{context}

Answer the question using only the retrieved knowledge. Be concise."#
        )
    }

    async fn generate_answer(&self, prompt: &str) -> Result<String> {
        self.llm.generate(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct EchoLlm;

    #[async_trait]
    impl LLMClient for EchoLlm {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(format!("echo:{}", prompt.len()))
        }
        async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
            self.generate(prompt).await
        }
        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn graph_fixture() -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        let graph = serde_json::json!([
            {
                "start_node": {"label": "entity", "properties": {"name": "Eiffel Tower"}},
                "end_node": {"label": "entity", "properties": {"name": "Paris"}},
                "relation": "located_in"
            },
            {
                "start_node": {"label": "entity", "properties": {"name": "Louvre"}},
                "end_node": {"label": "entity", "properties": {"name": "Paris"}},
                "relation": "located_in"
            },
            {
                "start_node": {"label": "entity", "properties": {"name": "Mona Lisa"}},
                "end_node": {"label": "entity", "properties": {"name": "Leonardo"}},
                "relation": "created_by"
            }
        ]);
        write!(f, "{}", graph).unwrap();
        f
    }

    fn chunks_fixture() -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"{{"id": "chunk-1", "text": "The Eiffel Tower stands in Paris, France."}}"#
        )
        .unwrap();
        writeln!(
            f,
            r#"{{"id": "chunk-2", "text": "The Mona Lisa was painted by Leonardo da Vinci."}}"#
        )
        .unwrap();
        f
    }

    fn retriever(graph: &NamedTempFile, chunks: &NamedTempFile) -> GraphRetriever {
        GraphRetriever::new(
            graph.path().to_path_buf(),
            chunks.path().to_path_buf(),
            Arc::new(EchoLlm),
        )
    }

    #[tokio::test]
    async fn retrieve_before_build_fails() {
        let graph = graph_fixture();
        let chunks = chunks_fixture();
        let r = retriever(&graph, &chunks);
        assert!(r.retrieve("anything", 5, None).await.is_err());
    }

    #[tokio::test]
    async fn retrieves_matching_triples_and_chunks() {
        let graph = graph_fixture();
        let chunks = chunks_fixture();
        let r = retriever(&graph, &chunks);
        r.build_indices().await.unwrap();

        let (result, elapsed) = r
            .retrieve("Where is the Eiffel Tower located?", 5, None)
            .await
            .unwrap();
        assert!(result.triples[0].contains("Eiffel Tower"));
        assert!(result.chunk_ids.contains(&"chunk-1".to_string()));
        assert!(elapsed <= Duration::from_secs(5));

        match result.chunk_contents {
            ChunkContents::Mapped(map) => {
                assert!(map["chunk-1"].contains("Eiffel Tower"));
            }
            ChunkContents::Aligned(_) => panic!("expected mapped contents"),
        }
    }

    #[tokio::test]
    async fn build_indices_is_idempotent() {
        let graph = graph_fixture();
        let chunks = chunks_fixture();
        let r = retriever(&graph, &chunks);
        r.build_indices().await.unwrap();
        r.build_indices().await.unwrap();
        let (result, _) = r.retrieve("Paris", 10, None).await.unwrap();
        assert_eq!(result.triples.len(), 2);
    }

    #[tokio::test]
    async fn involved_types_bias_breaks_ties() {
        let graph = graph_fixture();
        let chunks = chunks_fixture();
        let r = retriever(&graph, &chunks);
        r.build_indices().await.unwrap();

        let hints = InvolvedTypes {
            relations: vec!["created_by".to_string()],
            ..Default::default()
        };
        let (result, _) = r
            .retrieve("Mona Lisa Leonardo", 5, Some(&hints))
            .await
            .unwrap();
        assert!(result.triples[0].contains("created_by"));
    }

    #[tokio::test]
    async fn standard_edge_format_is_supported() {
        let mut f = NamedTempFile::new().unwrap();
        write!(
            f,
            "{}",
            serde_json::json!({
                "nodes": [{"id": "a"}, {"id": "b"}],
                "edges": [{"source": "a", "target": "b", "relation": "part_of"}]
            })
        )
        .unwrap();
        let chunks = chunks_fixture();
        let r = retriever(&f, &chunks);
        r.build_indices().await.unwrap();
        // Single-letter ids fall below the token length floor; the relation
        // still matches.
        let (result, _) = r.retrieve("part_of", 5, None).await.unwrap();
        assert_eq!(result.triples, vec!["('a', 'part_of', 'b')".to_string()]);
    }

    #[tokio::test]
    async fn large_index_retrieval_caps_at_top_k() {
        let mut f = NamedTempFile::new().unwrap();
        let items: Vec<serde_json::Value> = (0..200)
            .map(|i| {
                serde_json::json!({
                    "start_node": {"label": "entity", "properties": {"name": format!("Landmark {i}")}},
                    "end_node": {"label": "entity", "properties": {"name": "Paris"}},
                    "relation": "located_in"
                })
            })
            .collect();
        write!(f, "{}", serde_json::json!(items)).unwrap();
        let chunks = chunks_fixture();
        let r = retriever(&f, &chunks);
        r.build_indices().await.unwrap();

        let (result, _) = r.retrieve("landmarks in Paris", 10, None).await.unwrap();
        assert_eq!(result.triples.len(), 10);
        assert!(result.triples.iter().all(|t| t.contains("Paris")));
    }

    #[tokio::test]
    async fn empty_name_property_falls_through_to_next_key() {
        let mut f = NamedTempFile::new().unwrap();
        let graph = serde_json::json!([
            {
                "start_node": {"label": "entity", "properties": {"name": "", "summary": "Eiffel Tower"}},
                "end_node": {"label": "entity", "properties": {"name": "Paris"}},
                "relation": "located_in"
            }
        ]);
        write!(f, "{}", graph).unwrap();
        let chunks = chunks_fixture();
        let r = retriever(&f, &chunks);
        r.build_indices().await.unwrap();

        let (result, _) = r.retrieve("Eiffel Tower", 5, None).await.unwrap();
        assert_eq!(
            result.triples,
            vec!["('Eiffel Tower', 'located_in', 'Paris')".to_string()]
        );
    }

    #[tokio::test]
    async fn missing_graph_is_retrieval_error() {
        let chunks = chunks_fixture();
        let r = GraphRetriever::new(
            PathBuf::from("/nonexistent/graph.json"),
            chunks.path().to_path_buf(),
            Arc::new(EchoLlm),
        );
        let err = r.build_indices().await.unwrap_err();
        assert!(matches!(err, AppError::Retrieval(_)));
    }
}
