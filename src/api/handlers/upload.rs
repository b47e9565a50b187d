//! Multipart document upload.
//!
//! Creates a new dataset from the first uploaded filename and writes the
//! normalized corpus. Plain text and JSON are handled inline; any other
//! format goes through the optional [`DocumentExtractor`] and degrades to
//! empty text when extraction is unavailable or fails. The upload itself
//! never fails for that reason.

use crate::api::handlers::ClientParams;
use crate::datasets::DocumentExtractor;
use crate::types::{AppError, FileUploadResponse, Result};
use crate::AppState;
use axum::extract::{Multipart, Query, State};
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Turn a parsed JSON upload into corpus documents. An array of document
/// objects passes through; anything else becomes a single document
/// carrying the raw text.
fn normalize_json(filename: &str, value: Value, raw: &str) -> Vec<Value> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(obj)
                    if obj.get("text").is_some() || obj.get("content").is_some() =>
                {
                    Some(Value::Object(obj))
                }
                Value::String(s) => Some(json!({"title": filename, "text": s})),
                _ => None,
            })
            .collect(),
        Value::Object(obj) if obj.get("text").is_some() || obj.get("content").is_some() => {
            vec![Value::Object(obj)]
        }
        _ => vec![json!({"title": filename, "text": raw})],
    }
}

async fn extract_text(
    extractor: Option<&Arc<dyn DocumentExtractor>>,
    filename: &str,
    bytes: &[u8],
) -> String {
    match extractor {
        Some(extractor) => match extractor.extract(filename, bytes).await {
            Ok(text) => text,
            Err(e) => {
                warn!(filename, error = %e, "document extraction failed, storing empty text");
                String::new()
            }
        },
        None => {
            warn!(filename, "no document extractor configured, storing empty text");
            String::new()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/upload",
    responses(
        (status = 200, description = "Files uploaded", body = FileUploadResponse),
        (status = 400, description = "No files or malformed multipart body")
    ),
    tag = "datasets"
)]
pub async fn upload(
    State(state): State<AppState>,
    Query(params): Query<ClientParams>,
    mut multipart: Multipart,
) -> Result<Json<FileUploadResponse>> {
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read {}: {}", filename, e)))?;
        files.push((filename, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(AppError::InvalidInput("No files uploaded".to_string()));
    }

    let dataset_name = state.store.unique_dataset_name(&files[0].0);
    let total = files.len();
    let mut corpus: Vec<Value> = Vec::new();

    for (i, (filename, bytes)) in files.iter().enumerate() {
        state.publisher.send_progress(
            &params.client_id,
            "upload",
            ((i + 1) * 100 / total) as u8,
            &format!("Processing {} ({}/{})", filename, i + 1, total),
        );
        tokio::task::yield_now().await;

        let lower = filename.to_lowercase();
        if lower.ends_with(".txt") || lower.ends_with(".md") {
            corpus.push(json!({
                "title": filename,
                "text": String::from_utf8_lossy(bytes)
            }));
        } else if lower.ends_with(".json") {
            let raw = String::from_utf8_lossy(bytes).to_string();
            match serde_json::from_str::<Value>(&raw) {
                Ok(value) => corpus.extend(normalize_json(filename, value, &raw)),
                Err(e) => {
                    warn!(filename, error = %e, "invalid JSON upload, storing as plain text");
                    corpus.push(json!({"title": filename, "text": raw}));
                }
            }
        } else {
            let text = extract_text(state.extractor.as_ref(), filename, bytes).await;
            corpus.push(json!({"title": filename, "text": text}));
        }
    }

    state.store.write_corpus(&dataset_name, &corpus).await?;

    state.publisher.publish(
        &params.client_id,
        crate::events::ProgressEvent::complete(
            "upload",
            format!("Uploaded {} file(s) as dataset '{}'", total, dataset_name),
        ),
    );

    info!(
        dataset = %dataset_name,
        files = total,
        documents = corpus.len(),
        "upload finished"
    );

    Ok(Json(FileUploadResponse {
        success: true,
        message: format!("Successfully uploaded {} file(s)", total),
        dataset_name: Some(dataset_name),
        files_count: Some(total),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_array_of_documents_passes_through() {
        let value = json!([{"title": "a", "text": "x"}, {"content": "y"}]);
        let docs = normalize_json("f.json", value, "raw");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["text"], "x");
    }

    #[test]
    fn json_scalar_becomes_raw_text_document() {
        let docs = normalize_json("f.json", json!(42), "42");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["text"], "42");
        assert_eq!(docs[0]["title"], "f.json");
    }

    #[test]
    fn json_array_drops_non_documents() {
        let value = json!([{"no_text": 1}, "a plain string"]);
        let docs = normalize_json("f.json", value, "raw");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["text"], "a plain string");
    }
}
