//! Label normalization for classifier output.
//!
//! Classifier vocabularies often pack several synonyms and a score annotation
//! into one string (`"golden retriever, dog - 0.92"`). Anchors are keyed by
//! the canonical first token so synonym variants collapse to one label.

use crate::classifier::Classification;

const SYNONYM_SEPARATORS: [char; 2] = [',', '-'];

/// First token before the first `,` or `-`, trimmed. `None` if that token is empty.
pub fn canonical_label(raw: &str) -> Option<String> {
    let head = raw.split(SYNONYM_SEPARATORS).next().unwrap_or("").trim();
    if head.is_empty() {
        None
    } else {
        Some(head.to_string())
    }
}

/// Render the top `limit` entries as `"<label> - <confidence>"` lines.
pub fn ranked_summary(ranked: &[Classification], limit: usize) -> String {
    ranked
        .iter()
        .take(limit)
        .map(|entry| format!("{} - {:.2}", entry.label, entry.confidence))
        .collect::<Vec<_>>()
        .join("\n")
}
