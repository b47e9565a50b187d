//! Per-question accumulator of retrieval results.

use crate::retrieval::{ChunkContents, RetrievalResult};
use std::collections::{HashMap, HashSet};

/// Triples fed into a reasoning prompt are capped to the first 20 in
/// dedup-insertion order.
pub const TRIPLE_CAP: usize = 20;
/// Chunk contents fed into a reasoning prompt are capped to 10.
pub const CHUNK_CAP: usize = 10;

const MISSING_CONTENT_PREFIX: &str = "[Missing content for chunk ";

/// Union of everything retrieved for one question so far.
///
/// Monotonically grows across sub-question rounds and IRCoT rounds and
/// never shrinks mid-question. Triples are deduplicated by string value in
/// insertion order; every chunk id gets a best-effort text value, with a
/// placeholder substituted when no round has supplied the content.
///
/// Owned by the orchestrator task; there is no concurrent writer, so no
/// synchronization.
#[derive(Debug, Default)]
pub struct AggregatedContext {
    triples: Vec<String>,
    triple_set: HashSet<String>,
    chunk_ids: Vec<String>,
    chunk_id_set: HashSet<String>,
    chunk_contents: HashMap<String, String>,
}

impl AggregatedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one round of retrieval results in: set-union for triples (by
    /// value) and chunk ids, last-writer-wins for chunk contents.
    ///
    /// Aligned chunk contents are zipped against `chunk_ids` by index; a
    /// shorter contents sequence simply leaves the trailing ids without
    /// content this round; a later round may still fill them.
    pub fn absorb(&mut self, result: &RetrievalResult) {
        for triple in &result.triples {
            if self.triple_set.insert(triple.clone()) {
                self.triples.push(triple.clone());
            }
        }
        for id in &result.chunk_ids {
            if self.chunk_id_set.insert(id.clone()) {
                self.chunk_ids.push(id.clone());
            }
        }
        match &result.chunk_contents {
            ChunkContents::Mapped(map) => {
                for (id, text) in map {
                    self.chunk_contents.insert(id.clone(), text.clone());
                }
            }
            ChunkContents::Aligned(texts) => {
                for (id, text) in result.chunk_ids.iter().zip(texts.iter()) {
                    self.chunk_contents.insert(id.clone(), text.clone());
                }
            }
        }
    }

    pub fn triple_count(&self) -> usize {
        self.triples.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_ids.len()
    }

    /// Deduplicated triples in insertion order, capped.
    pub fn capped_triples(&self, cap: usize) -> Vec<String> {
        self.triples.iter().take(cap).cloned().collect()
    }

    /// Chunk texts in chunk-id insertion order, placeholder-substituted,
    /// capped.
    pub fn capped_chunk_texts(&self, cap: usize) -> Vec<String> {
        self.chunk_ids
            .iter()
            .take(cap)
            .map(|id| {
                self.chunk_contents
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| format!("{}{}]", MISSING_CONTENT_PREFIX, id))
            })
            .collect()
    }

    /// The capped prompt context: first [`TRIPLE_CAP`] triples and
    /// [`CHUNK_CAP`] chunk texts.
    pub fn prompt_context(&self) -> String {
        format!(
            "=== Triples ===\n{}\n=== Chunks ===\n{}",
            self.capped_triples(TRIPLE_CAP).join("\n"),
            self.capped_chunk_texts(CHUNK_CAP).join("\n")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(triples: &[&str], ids: &[&str], contents: ChunkContents) -> RetrievalResult {
        RetrievalResult {
            triples: triples.iter().map(|s| s.to_string()).collect(),
            chunk_ids: ids.iter().map(|s| s.to_string()).collect(),
            chunk_contents: contents,
        }
    }

    #[test]
    fn triples_grow_monotonically_and_dedup_is_idempotent() {
        let mut ctx = AggregatedContext::new();
        ctx.absorb(&round(&["t1", "t2"], &[], ChunkContents::default()));
        assert_eq!(ctx.triple_count(), 2);

        // Re-adding an already-seen value changes nothing.
        ctx.absorb(&round(&["t2", "t1"], &[], ChunkContents::default()));
        assert_eq!(ctx.triple_count(), 2);

        ctx.absorb(&round(&["t3"], &[], ChunkContents::default()));
        assert_eq!(ctx.triple_count(), 3);
        assert_eq!(ctx.capped_triples(10), vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn mapped_contents_copy_by_key() {
        let mut ctx = AggregatedContext::new();
        let mut map = HashMap::new();
        map.insert("c1".to_string(), "text one".to_string());
        ctx.absorb(&round(&[], &["c1"], ChunkContents::Mapped(map)));
        assert_eq!(ctx.capped_chunk_texts(10), vec!["text one"]);
    }

    #[test]
    fn aligned_contents_zip_by_index_tolerating_shortfall() {
        let mut ctx = AggregatedContext::new();
        ctx.absorb(&round(
            &[],
            &["c1", "c2", "c3"],
            ChunkContents::Aligned(vec!["one".to_string(), "two".to_string()]),
        ));
        let texts = ctx.capped_chunk_texts(10);
        assert_eq!(texts[0], "one");
        assert_eq!(texts[1], "two");
        assert_eq!(texts[2], "[Missing content for chunk c3]");
    }

    #[test]
    fn later_round_fills_missing_content() {
        let mut ctx = AggregatedContext::new();
        ctx.absorb(&round(
            &[],
            &["c1", "c2"],
            ChunkContents::Aligned(vec!["one".to_string()]),
        ));
        let mut map = HashMap::new();
        map.insert("c2".to_string(), "two, finally".to_string());
        ctx.absorb(&round(&[], &["c2"], ChunkContents::Mapped(map)));
        assert_eq!(ctx.capped_chunk_texts(10), vec!["one", "two, finally"]);
    }

    #[test]
    fn prompt_context_respects_caps() {
        let mut ctx = AggregatedContext::new();
        let many: Vec<String> = (0..30).map(|i| format!("triple-{i}")).collect();
        let refs: Vec<&str> = many.iter().map(|s| s.as_str()).collect();
        ctx.absorb(&round(&refs, &[], ChunkContents::default()));

        assert_eq!(ctx.capped_triples(TRIPLE_CAP).len(), 20);
        let context = ctx.prompt_context();
        assert!(context.contains("triple-19"));
        assert!(!context.contains("triple-20"));
    }

    #[test]
    fn chunk_ids_never_shrink() {
        let mut ctx = AggregatedContext::new();
        ctx.absorb(&round(&[], &["c1"], ChunkContents::default()));
        ctx.absorb(&round(&[], &[], ChunkContents::default()));
        assert_eq!(ctx.chunk_count(), 1);
    }
}
