//! Step trace and its visualization projections.
//!
//! Everything here is a pure, read-only view over data the pipeline
//! already produced; a malformed triple is skipped, never fatal.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::retrieval::SubQuestion;

/// One entry in the append-only reasoning trace, in temporal order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReasoningStep {
    SubQuestion {
        question: String,
        /// Preview of this round's triples (first 10).
        triples: Vec<String>,
        triples_count: usize,
        chunks_count: usize,
        processing_time: f64,
        chunk_contents: Vec<String>,
    },
    IrcotStep {
        question: String,
        triples: Vec<String>,
        triples_count: usize,
        chunks_count: usize,
        processing_time: f64,
        chunk_contents: Vec<String>,
        thought: String,
    },
}

impl ReasoningStep {
    fn question(&self) -> &str {
        match self {
            ReasoningStep::SubQuestion { question, .. } => question,
            ReasoningStep::IrcotStep { question, .. } => question,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ReasoningStep::SubQuestion { .. } => "sub_question",
            ReasoningStep::IrcotStep { .. } => "ircot_step",
        }
    }

    fn counts(&self) -> (usize, usize, f64) {
        match self {
            ReasoningStep::SubQuestion {
                triples_count,
                chunks_count,
                processing_time,
                ..
            }
            | ReasoningStep::IrcotStep {
                triples_count,
                chunks_count,
                processing_time,
                ..
            } => (*triples_count, *chunks_count, *processing_time),
        }
    }

    pub fn triples_count(&self) -> usize {
        self.counts().0
    }
}

/// Truncate to at most `max` characters (not bytes).
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

/// Parse a string-encoded triple into `(subject, relation, object)`.
///
/// Accepts tuple- or list-style encodings like `('a', 'rel', 'b')` or
/// `["a", "rel", "b"]`. Anything that does not yield exactly three
/// elements is rejected.
pub fn parse_triple(raw: &str) -> Option<(String, String, String)> {
    let trimmed = raw.trim();
    let inner = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        &trimmed[1..trimmed.len() - 1]
    } else if trimmed.starts_with('[') && trimmed.ends_with(']') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        return None;
    };

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in inner.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None => match c {
                '\'' | '"' => quote = Some(c),
                ',' => parts.push(std::mem::take(&mut current)),
                _ => current.push(c),
            },
        }
    }
    parts.push(current);

    let cleaned: Vec<String> = parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .collect();

    if cleaned.len() == 3 && cleaned.iter().all(|p| !p.is_empty()) {
        let mut it = cleaned.into_iter();
        Some((it.next()?, it.next()?, it.next()?))
    } else {
        None
    }
}

/// Star topology linking the original question to each sub-question.
pub fn subquery_graph(sub_questions: &[SubQuestion]) -> Value {
    let mut nodes = vec![json!({
        "id": "original",
        "name": "Original Question",
        "category": "question",
        "symbolSize": 40
    })];
    let mut links = Vec::new();

    for (i, sq) in sub_questions.iter().enumerate() {
        let sub_id = format!("sub_{}", i);
        nodes.push(json!({
            "id": sub_id,
            "name": format!("{}...", truncate_chars(&sq.text, 20)),
            "category": "sub_question",
            "symbolSize": 30
        }));
        links.push(json!({
            "source": "original",
            "target": sub_id,
            "name": "decomposed to"
        }));
    }

    json!({
        "nodes": nodes,
        "links": links,
        "categories": [
            {"name": "question", "itemStyle": {"color": "#ff6b6b"}},
            {"name": "sub_question", "itemStyle": {"color": "#4ecdc4"}}
        ]
    })
}

/// Entity-relation graph reconstructed from the first 10 final triples.
/// Malformed triples are skipped.
pub fn knowledge_graph(triples: &[String]) -> Value {
    let mut nodes = Vec::new();
    let mut links = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for raw in triples.iter().take(10) {
        let Some((source, relation, target)) = parse_triple(raw) else {
            continue;
        };
        for entity in [&source, &target] {
            if seen.insert(entity.clone()) {
                nodes.push(json!({
                    "id": entity,
                    "name": truncate_chars(entity, 20),
                    "category": "entity",
                    "symbolSize": 20
                }));
            }
        }
        links.push(json!({
            "source": source,
            "target": target,
            "name": relation
        }));
    }

    json!({
        "nodes": nodes,
        "links": links,
        "categories": [{"name": "entity", "itemStyle": {"color": "#95de64"}}]
    })
}

/// Flat per-step timeline of counts and elapsed times.
pub fn reasoning_flow(steps: &[ReasoningStep]) -> Value {
    let steps_data: Vec<Value> = steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let (triples_count, chunks_count, processing_time) = step.counts();
            json!({
                "step": i + 1,
                "type": step.kind(),
                "question": truncate_chars(step.question(), 50),
                "triples_count": triples_count,
                "chunks_count": chunks_count,
                "processing_time": processing_time
            })
        })
        .collect();

    let timeline: Vec<f64> = steps.iter().map(|s| s.counts().2).collect();

    json!({
        "steps": steps_data,
        "timeline": timeline
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_triple_tuple_style() {
        assert_eq!(
            parse_triple("('X', 'located_in', 'Y')"),
            Some(("X".into(), "located_in".into(), "Y".into()))
        );
    }

    #[test]
    fn parse_triple_list_style() {
        assert_eq!(
            parse_triple(r#"["a", "rel", "b"]"#),
            Some(("a".into(), "rel".into(), "b".into()))
        );
    }

    #[test]
    fn parse_triple_tolerates_commas_inside_quotes() {
        assert_eq!(
            parse_triple("('Paris, France', 'capital_of', 'France')"),
            Some(("Paris, France".into(), "capital_of".into(), "France".into()))
        );
    }

    #[test]
    fn parse_triple_rejects_wrong_arity() {
        assert_eq!(parse_triple("('a', 'b')"), None);
        assert_eq!(parse_triple("('a', 'b', 'c', 'd')"), None);
    }

    #[test]
    fn parse_triple_rejects_unwrapped_text() {
        assert_eq!(parse_triple("just some text"), None);
        assert_eq!(parse_triple(""), None);
    }

    #[test]
    fn well_formed_triple_round_trips_to_one_link() {
        let graph = knowledge_graph(&["('X', 'located_in', 'Y')".to_string()]);
        assert_eq!(graph["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(graph["links"].as_array().unwrap().len(), 1);
        assert_eq!(graph["links"][0]["name"], "located_in");
    }

    #[test]
    fn malformed_triple_yields_no_nodes_or_links() {
        let graph = knowledge_graph(&["not a triple".to_string()]);
        assert!(graph["nodes"].as_array().unwrap().is_empty());
        assert!(graph["links"].as_array().unwrap().is_empty());
    }

    #[test]
    fn knowledge_graph_dedups_shared_entities() {
        let graph = knowledge_graph(&[
            "('A', 'knows', 'B')".to_string(),
            "('A', 'likes', 'C')".to_string(),
        ]);
        assert_eq!(graph["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(graph["links"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn knowledge_graph_caps_at_ten_triples() {
        let triples: Vec<String> = (0..15)
            .map(|i| format!("('s{i}', 'r', 'o{i}')"))
            .collect();
        let graph = knowledge_graph(&triples);
        assert_eq!(graph["links"].as_array().unwrap().len(), 10);
    }

    #[test]
    fn subquery_graph_is_a_star() {
        let subs = vec![
            SubQuestion::new("Where is the Eiffel Tower?"),
            SubQuestion::new("What city is that in?"),
        ];
        let graph = subquery_graph(&subs);
        assert_eq!(graph["nodes"].as_array().unwrap().len(), 3);
        let links = graph["links"].as_array().unwrap();
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l["source"] == "original"));
    }

    #[test]
    fn reasoning_flow_preserves_order_and_counts() {
        let steps = vec![
            ReasoningStep::SubQuestion {
                question: "q1".to_string(),
                triples: vec![],
                triples_count: 4,
                chunks_count: 2,
                processing_time: 0.5,
                chunk_contents: vec![],
            },
            ReasoningStep::IrcotStep {
                question: "q2".to_string(),
                triples: vec![],
                triples_count: 6,
                chunks_count: 3,
                processing_time: 0.0,
                chunk_contents: vec![],
                thought: "hmm".to_string(),
            },
        ];
        let flow = reasoning_flow(&steps);
        assert_eq!(flow["steps"][0]["type"], "sub_question");
        assert_eq!(flow["steps"][1]["type"], "ircot_step");
        assert_eq!(flow["steps"][1]["step"], 2);
        assert_eq!(flow["timeline"], serde_json::json!([0.5, 0.0]));
    }

    #[test]
    fn step_serializes_with_snake_case_tag() {
        let step = ReasoningStep::IrcotStep {
            question: "q".to_string(),
            triples: vec![],
            triples_count: 0,
            chunks_count: 0,
            processing_time: 0.0,
            chunk_contents: vec![],
            thought: "t".to_string(),
        };
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["type"], "ircot_step");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
        assert_eq!(truncate_chars("short", 50), "short");
    }
}
