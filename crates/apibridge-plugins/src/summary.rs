//! Response summarization.
//!
//! Raw API responses can be arbitrarily large; the model only needs enough to
//! reason about the result.  Summaries keep the first few entries of list
//! shapes and truncate everything else to a fixed character budget.

use serde_json::Value;

/// Character budget for a summarized response body.
const SUMMARY_BUDGET: usize = 800;

/// How many leading items of a list response the summary shows.
const PREVIEW_ITEMS: usize = 3;

/// Summarize a parsed response body for the model.
///
/// Arrays and paginated `{items: [...], total?}` objects get a count plus a
/// preview of the first entries; anything else is the serialized body
/// truncated to the budget.
pub fn summarize_response(action_id: &str, data: &Value) -> String {
    if let Some(items) = data.as_array() {
        let preview: Vec<String> = items
            .iter()
            .take(PREVIEW_ITEMS)
            .map(|item| serde_json::to_string(item).unwrap_or_default())
            .collect();
        return truncate_chars(
            &format!(
                "{} returned {} results: {}",
                action_id,
                items.len(),
                preview.join(", ")
            ),
            SUMMARY_BUDGET,
        );
    }

    if let Some(items) = data.get("items").and_then(Value::as_array) {
        let total = data
            .get("total")
            .and_then(Value::as_u64)
            .unwrap_or(items.len() as u64);
        let names: Vec<String> = items
            .iter()
            .take(PREVIEW_ITEMS)
            .map(item_label)
            .collect();
        return truncate_chars(
            &format!("Found {} results: {}", total, names.join(", ")),
            SUMMARY_BUDGET,
        );
    }

    truncate_chars(
        &serde_json::to_string(data).unwrap_or_default(),
        SUMMARY_BUDGET,
    )
}

/// Best-effort human label for one list entry: `name`, then `title`, then the
/// serialized entry.
fn item_label(item: &Value) -> String {
    item.get("name")
        .or_else(|| item.get("title"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| truncate_chars(&serde_json::to_string(item).unwrap_or_default(), 80))
}

/// Truncate a string to `max` characters, appending a marker when cut.
///
/// Operates on character boundaries, so multi-byte text is safe.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_owned();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{cut}… [truncated]")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
