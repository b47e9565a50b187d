//! Marker parsing for reasoning-model output.
//!
//! The reasoning model signals control flow through two literal markers in
//! free text. Parsing them is a fragile textual contract with an external
//! collaborator, so it is isolated here as pure functions and tested
//! exhaustively.

/// Terminates the loop with everything after it as the final answer.
pub const ANSWER_MARKER: &str = "So the answer is:";
/// Requests another retrieval round with the text after it (up to the
/// first line break) as the refined query.
pub const QUERY_MARKER: &str = "The new query is:";

/// Extract the final answer: everything after the first (case-insensitive)
/// occurrence of [`ANSWER_MARKER`], across line breaks, trimmed. `None`
/// when the marker is absent. The extracted answer may be empty.
pub fn extract_answer(text: &str) -> Option<String> {
    let pos = find_ascii_case_insensitive(text, ANSWER_MARKER)?;
    Some(text[pos + ANSWER_MARKER.len()..].trim().to_string())
}

/// Extract the candidate next query: the text after the first occurrence
/// of [`QUERY_MARKER`], truncated at the first line break, trimmed. `None`
/// when the marker is absent; `Some("")` when the marker is present but
/// followed by nothing (the caller's cycle guard treats that as terminal).
pub fn extract_new_query(text: &str) -> Option<String> {
    let (_, rest) = text.split_once(QUERY_MARKER)?;
    Some(rest.trim().lines().next().unwrap_or("").trim().to_string())
}

/// Byte position of `needle` in `haystack`, ignoring ASCII case. The
/// needle is pure ASCII, so a match position is always a char boundary.
fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}
