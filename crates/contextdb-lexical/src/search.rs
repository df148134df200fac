/// Lowercased whitespace tokens of `query`, duplicates kept.
pub fn query_tokens(query: &str) -> Vec<String> {
    query.to_lowercase().split_whitespace().map(str::to_string).collect()
}

/// Fraction of `tokens` that occur as substrings of `lowered_text`.
///
/// `lowered_text` must already be lowercase. Returns 0.0 for no tokens.
#[allow(clippy::cast_precision_loss)]
pub fn overlap_score(tokens: &[String], lowered_text: &str) -> f32 {
    if tokens.is_empty() { return 0.0; }
    let matched = tokens.iter().filter(|t| lowered_text.contains(t.as_str())).count();
    matched as f32 / tokens.len() as f32
}
