//! Agentic iterative retrieval-reasoning orchestrator.
//!
//! Turns one question into a bounded sequence of decomposition, retrieval,
//! context aggregation and reasoning steps, and terminates with a final
//! answer plus a structured trace. The whole run executes as one
//! cooperative task; blocking collaborator calls are awaited, and a yield
//! follows every published event so a connected observer sees progress
//! promptly instead of batched at the end.

/// Per-question retrieval accumulator.
pub mod context;
/// Marker parsing for reasoning-model output.
pub mod markers;
/// Step trace and visualization projections.
pub mod trace;

use crate::events::{ProgressEvent, ProgressPublisher};
use crate::retrieval::{Decomposer, Decomposition, RetrievalResult, Retriever};
use crate::types::{QuestionResponse, Result, VisualizationData};
use context::{AggregatedContext, CHUNK_CAP, TRIPLE_CAP};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use trace::{truncate_chars, ReasoningStep};

const THOUGHT_LOG_LIMIT: usize = 400;
const THOUGHT_TRACE_LIMIT: usize = 300;
const PREVIEW_LIMIT: usize = 200;
const ANSWER_PREVIEW_LIMIT: usize = 300;

/// Drives one question through decomposition, per-sub-question retrieval,
/// and the IRCoT loop.
pub struct QaOrchestrator {
    decomposer: Arc<dyn Decomposer>,
    retriever: Arc<dyn Retriever>,
    publisher: Arc<ProgressPublisher>,
    top_k: usize,
    max_steps: u32,
}

impl QaOrchestrator {
    pub fn new(
        decomposer: Arc<dyn Decomposer>,
        retriever: Arc<dyn Retriever>,
        publisher: Arc<ProgressPublisher>,
        top_k: usize,
        max_steps: u32,
    ) -> Self {
        Self {
            decomposer,
            retriever,
            publisher,
            top_k,
            max_steps,
        }
    }

    /// Publish an event and give the streaming side channel a chance to
    /// flush before the next blocking collaborator call.
    async fn emit(&self, client_id: &str, event: ProgressEvent) {
        self.publisher.publish(client_id, event);
        tokio::task::yield_now().await;
    }

    /// Answer a question against an already-indexed dataset.
    ///
    /// Failures inside a single stage are recovered locally per the stage
    /// rules; only an error with no recovery path escapes to the caller.
    pub async fn answer_question(
        &self,
        question: &str,
        dataset_name: &str,
        schema_path: &Path,
        client_id: &str,
    ) -> Result<QuestionResponse> {
        self.emit(
            client_id,
            ProgressEvent::qa_update(
                "start",
                json!({
                    "message": "Question processing started",
                    "dataset": dataset_name,
                    "question": question,
                }),
            ),
        )
        .await;

        // Stage 1: decomposition, degrading to a single pseudo-sub-question.
        self.publisher
            .send_progress(client_id, "retrieval", 50, "Decomposing question...");
        let decomposition = match self.decomposer.decompose(question, schema_path).await {
            Ok(d) => d,
            Err(e) => {
                tracing::error!("Decompose failed: {}", e);
                Decomposition::fallback(question)
            }
        };
        let sub_questions = decomposition.sub_questions;
        let involved_types = decomposition.involved_types;

        let preview: Vec<&str> = sub_questions
            .iter()
            .take(5)
            .map(|sq| sq.text.as_str())
            .collect();
        self.emit(
            client_id,
            ProgressEvent::qa_update(
                "decompose",
                json!({
                    "sub_questions_count": sub_questions.len(),
                    "sub_questions": preview,
                }),
            ),
        )
        .await;

        let mut ctx = AggregatedContext::new();
        let mut reasoning_steps: Vec<ReasoningStep> = Vec::new();

        // Stage 2: one retrieval round per sub-question, in decomposition
        // order. A failed round contributes an empty result and the
        // pipeline moves on.
        self.publisher
            .send_progress(client_id, "retrieval", 65, "Initial retrieval...");
        for (idx, sq) in sub_questions.iter().enumerate() {
            let (result, elapsed) = match self
                .retriever
                .retrieve(&sq.text, self.top_k, Some(&involved_types))
                .await
            {
                Ok(round) => round,
                Err(e) => {
                    tracing::error!("Retrieval failed for sub-question {}: {}", idx + 1, e);
                    (RetrievalResult::default(), Duration::ZERO)
                }
            };

            ctx.absorb(&result);
            reasoning_steps.push(ReasoningStep::SubQuestion {
                question: sq.text.clone(),
                triples: result.triples.iter().take(10).cloned().collect(),
                triples_count: result.triples.len(),
                chunks_count: result.chunk_ids.len(),
                processing_time: elapsed.as_secs_f64(),
                chunk_contents: ctx.capped_chunk_texts(3),
            });

            let triples_preview = dedup_preview(&result.triples, 5);
            self.emit(
                client_id,
                ProgressEvent::qa_update(
                    "sub_question",
                    json!({
                        "index": idx + 1,
                        "total": sub_questions.len(),
                        "question": sq.text,
                        "triples_preview": triples_preview,
                        "triples_count": result.triples.len(),
                        "chunks_count": result.chunk_ids.len(),
                        "processing_time": elapsed.as_secs_f64(),
                    }),
                ),
            )
            .await;
        }

        // Stage 3: IRCoT iterative refinement.
        self.publisher
            .send_progress(client_id, "retrieval", 75, "Iterative reasoning...");
        self.emit(
            client_id,
            ProgressEvent::qa_update(
                "ircot_start",
                json!({"message": "Starting iterative reasoning"}),
            ),
        )
        .await;

        let final_answer = self
            .ircot_loop(question, client_id, &mut ctx, &mut reasoning_steps)
            .await;

        // Final aggregation and trace projections.
        let final_triples = ctx.capped_triples(TRIPLE_CAP);
        let final_chunks = ctx.capped_chunk_texts(CHUNK_CAP);

        self.publisher.send_progress(
            client_id,
            "retrieval",
            100,
            "Answer generation completed!",
        );
        self.emit(
            client_id,
            ProgressEvent::qa_complete(json!({
                "answer_preview": truncate_chars(&final_answer, ANSWER_PREVIEW_LIMIT),
                "sub_questions_count": sub_questions.len(),
                "triples_final_count": final_triples.len(),
                "chunks_final_count": final_chunks.len(),
            })),
        )
        .await;

        let triples_by_subquery: Vec<usize> = reasoning_steps
            .iter()
            .filter(|s| matches!(s, ReasoningStep::SubQuestion { .. }))
            .map(|s| s.triples_count())
            .collect();

        let visualization_data = VisualizationData {
            subqueries: trace::subquery_graph(&sub_questions),
            knowledge_graph: trace::knowledge_graph(&final_triples),
            reasoning_flow: trace::reasoning_flow(&reasoning_steps),
            retrieval_details: json!({
                "total_triples": final_triples.len(),
                "total_chunks": final_chunks.len(),
                "sub_questions_count": sub_questions.len(),
                "triples_by_subquery": triples_by_subquery,
            }),
        };

        let sub_questions_json = sub_questions
            .iter()
            .map(|sq| serde_json::to_value(sq))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(QuestionResponse {
            answer: final_answer,
            sub_questions: sub_questions_json,
            retrieved_triples: final_triples,
            retrieved_chunks: final_chunks,
            reasoning_steps,
            visualization_data,
        })
    }

    /// The bounded reasoning loop: one initial answer attempt plus at most
    /// `max_steps` reasoning iterations.
    ///
    /// Termination is conservative: an explicit answer marker commits, a
    /// reply missing the refinement marker falls back to the initial
    /// answer, and a repeated or empty candidate query trips the cycle
    /// guard. All three stop iteration rather than guessing.
    async fn ircot_loop(
        &self,
        question: &str,
        client_id: &str,
        ctx: &mut AggregatedContext,
        reasoning_steps: &mut Vec<ReasoningStep>,
    ) -> String {
        let mut thoughts: Vec<String> = Vec::new();
        let mut current_query = question.to_string();

        // Initial answer attempt over everything retrieved so far; this is
        // the fallback if the loop never commits an explicit answer.
        let init_prompt = self
            .retriever
            .generate_prompt(question, &ctx.prompt_context());
        let initial_answer = match self.retriever.generate_answer(&init_prompt).await {
            Ok(answer) => answer,
            Err(e) => format!("Initial answer failed: {}", e),
        };
        thoughts.push(format!("Initial: {}", truncate_chars(&initial_answer, 200)));
        let mut final_answer = initial_answer.clone();

        for step in 1..=self.max_steps {
            let loop_prompt = compose_reasoning_prompt(
                question,
                &current_query,
                &ctx.prompt_context(),
                &thoughts,
            );
            let reasoning = match self.retriever.generate_answer(&loop_prompt).await {
                Ok(output) => output,
                // Substitute error text so the loop can still terminate
                // gracefully through the marker rules below.
                Err(e) => format!("Reasoning error: {}", e),
            };

            thoughts.push(truncate_chars(&reasoning, THOUGHT_LOG_LIMIT));
            reasoning_steps.push(ReasoningStep::IrcotStep {
                question: current_query.clone(),
                triples: ctx.capped_triples(10),
                triples_count: ctx.triple_count(),
                chunks_count: ctx.chunk_count(),
                processing_time: 0.0,
                chunk_contents: ctx.capped_chunk_texts(3),
                thought: truncate_chars(&reasoning, THOUGHT_TRACE_LIMIT),
            });

            self.emit(
                client_id,
                ProgressEvent::qa_update(
                    "ircot",
                    json!({
                        "step": step,
                        "max_steps": self.max_steps,
                        "current_query": current_query,
                        "thought_preview": truncate_chars(&reasoning, PREVIEW_LIMIT),
                    }),
                ),
            )
            .await;

            // Rule A: explicit answer commits and terminates.
            if let Some(answer) = markers::extract_answer(&reasoning) {
                final_answer = answer;
                break;
            }

            // Rule B: no refinement marker means the model cannot continue
            // productively; stand on the initial answer.
            let Some(candidate) = markers::extract_new_query(&reasoning) else {
                final_answer = fallback_answer(&initial_answer, &reasoning);
                break;
            };

            // Rule C: empty or repeated query is a cycle; stop rather than
            // oscillate on a query the retriever cannot refine.
            if candidate.is_empty() || candidate == current_query {
                final_answer = fallback_answer(&initial_answer, &reasoning);
                break;
            }

            current_query = candidate;
            self.publisher.send_progress(
                client_id,
                "retrieval",
                (75 + step * 5).min(90) as u8,
                &format!("Iterative retrieval step {}...", step),
            );

            // No involved-types hint here; the hint is sub-question-specific
            // and refinement queries are not sub-questions.
            match self.retriever.retrieve(&current_query, self.top_k, None).await {
                Ok((result, _)) => ctx.absorb(&result),
                Err(e) => {
                    // Treated as an empty round; the next iteration reasons
                    // over whatever context already exists.
                    tracing::error!("Iterative retrieval failed: {}", e);
                }
            }
        }

        final_answer
    }
}

fn fallback_answer(initial_answer: &str, reasoning: &str) -> String {
    if initial_answer.is_empty() {
        reasoning.to_string()
    } else {
        initial_answer.to_string()
    }
}

fn compose_reasoning_prompt(
    question: &str,
    current_query: &str,
    context: &str,
    thoughts: &[String],
) -> String {
    let previous_thoughts = if thoughts.is_empty() {
        "None".to_string()
    } else {
        thoughts.join(" | ")
    };
    format!(
        r#"You are an expert knowledge assistant using iterative retrieval with chain-of-thought reasoning.
Current Question: {question}
Current Iteration Query: {current_query}
Knowledge Context:
{context}
Previous Thoughts: {previous_thoughts}
Instructions:
1. If enough info answer with: So the answer is: <answer>
2. Else propose new query with: The new query is: <query>
Your reasoning:
"#
    )
}

fn dedup_preview(triples: &[String], cap: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    triples
        .iter()
        .filter(|t| seen.insert(t.as_str()))
        .take(cap)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_preview_collapses_by_value() {
        let triples = vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
            "c".to_string(),
        ];
        assert_eq!(dedup_preview(&triples, 5), vec!["a", "b", "c"]);
        assert_eq!(dedup_preview(&triples, 2), vec!["a", "b"]);
    }

    #[test]
    fn reasoning_prompt_carries_all_sections() {
        let prompt = compose_reasoning_prompt(
            "Where is X?",
            "Where exactly is X?",
            "=== Triples ===\nt1",
            &["Initial: something".to_string()],
        );
        assert!(prompt.contains("Current Question: Where is X?"));
        assert!(prompt.contains("Current Iteration Query: Where exactly is X?"));
        assert!(prompt.contains("t1"));
        assert!(prompt.contains("Initial: something"));
    }

    #[test]
    fn reasoning_prompt_without_thoughts_says_none() {
        let prompt = compose_reasoning_prompt("q", "q", "ctx", &[]);
        assert!(prompt.contains("Previous Thoughts: None"));
    }

    #[test]
    fn fallback_prefers_initial_answer() {
        assert_eq!(fallback_answer("initial", "raw output"), "initial");
        assert_eq!(fallback_answer("", "raw output"), "raw output");
    }
}
