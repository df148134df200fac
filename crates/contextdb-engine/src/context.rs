use serde::{Deserialize, Serialize};

use contextdb_core::types::SearchHit;

/// Where a passage in the assembled context came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub document_id: String,
    pub start_char: usize,
    pub end_char: usize,
    pub preview: String,
    pub score: f32,
}

/// Prompt-ready context built from ranked hits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub text: String,
    pub citations: Vec<Citation>,
    pub hits: Vec<SearchHit>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool { self.hits.is_empty() }
}

/// Render hits as `[Document <id>]:\n<text>` blocks separated by a blank
/// line, in rank order.
///
/// With `max_chars > 0`, stops before the block that would push the text
/// past the limit; the first block is always kept. Citations and `hits`
/// cover exactly the included blocks. Lengths are counted in chars.
pub fn assemble_context(hits: Vec<SearchHit>, max_chars: usize, preview_chars: usize) -> RetrievedContext {
    let mut text = String::new();
    let mut used = 0usize;
    let mut citations = Vec::with_capacity(hits.len());
    let mut included = Vec::with_capacity(hits.len());

    for hit in hits {
        let block = format!("[Document {}]:\n{}", hit.id, hit.text);
        let sep = if text.is_empty() { 0 } else { 2 };
        let block_chars = block.chars().count();
        if max_chars > 0 && !included.is_empty() && used + sep + block_chars > max_chars {
            break;
        }
        if sep > 0 { text.push_str("\n\n"); }
        text.push_str(&block);
        used += sep + block_chars;

        let text_chars = hit.text.chars().count();
        citations.push(Citation {
            document_id: hit.id.clone(),
            start_char: 0,
            end_char: text_chars.min(preview_chars),
            preview: hit.text.chars().take(preview_chars).collect(),
            score: hit.score,
        });
        included.push(hit);
    }

    RetrievedContext { text, citations, hits: included }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contextdb_core::types::{BackendKind, Metadata};

    fn hit(id: &str, text: &str, score: f32) -> SearchHit {
        SearchHit { id: id.into(), text: text.into(), score, metadata: Metadata::new(), source: BackendKind::InMemory }
    }

    #[test]
    fn formats_blocks_in_rank_order() {
        let ctx = assemble_context(vec![hit("d1", "Payment due", 1.0), hit("d2", "Net 30", 0.5)], 0, 200);
        assert_eq!(ctx.text, "[Document d1]:\nPayment due\n\n[Document d2]:\nNet 30");
        assert_eq!(ctx.citations.len(), 2);
        assert_eq!(ctx.citations[1].document_id, "d2");
        assert_eq!(ctx.citations[1].end_char, 6);
    }

    #[test]
    fn preview_is_truncated_on_char_boundaries() {
        let long = "é".repeat(300);
        let ctx = assemble_context(vec![hit("x", &long, 0.9)], 0, 200);
        let c = &ctx.citations[0];
        assert_eq!((c.start_char, c.end_char), (0, 200));
        assert_eq!(c.preview.chars().count(), 200);
    }

    #[test]
    fn char_budget_drops_trailing_blocks_but_keeps_the_first() {
        let hits = vec![hit("a", &"x".repeat(50), 1.0), hit("b", "short", 0.9)];
        let ctx = assemble_context(hits.clone(), 10, 200);
        assert_eq!(ctx.hits.len(), 1, "first block kept even when over budget");
        assert_eq!(ctx.citations.len(), 1);

        let ctx = assemble_context(hits, 1000, 200);
        assert_eq!(ctx.hits.len(), 2);
    }

    #[test]
    fn no_hits_no_context() {
        let ctx = assemble_context(Vec::new(), 0, 200);
        assert!(ctx.is_empty());
        assert!(ctx.text.is_empty());
        assert!(ctx.citations.is_empty());
    }
}
