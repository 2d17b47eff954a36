//! Context assembly under a token budget.

use docqa_types::Chunk;
use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

/// Counts tokens with the `cl100k_base` encoding.
pub struct TokenCounter {
    bpe: Option<CoreBPE>,
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter {
    /// Falls back to a ~4 chars per token estimate if the encoding cannot
    /// be loaded.
    pub fn new() -> Self {
        let bpe = match tiktoken_rs::cl100k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                warn!(error = %e, "Tokenizer unavailable, estimating token counts");
                None
            }
        };
        Self { bpe }
    }

    pub fn count(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => text.len().div_ceil(4),
        }
    }

    /// Longest prefix of `text` that fits in `max_tokens`.
    pub fn truncate(&self, text: &str, max_tokens: usize) -> String {
        match &self.bpe {
            Some(bpe) => {
                let tokens = bpe.encode_with_special_tokens(text);
                if tokens.len() <= max_tokens {
                    return text.to_string();
                }
                bpe.decode(tokens[..max_tokens].to_vec())
                    .unwrap_or_else(|_| char_prefix(text, max_tokens * 4))
            }
            None => char_prefix(text, max_tokens * 4),
        }
    }
}

fn char_prefix(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Render retrieved chunks as numbered sources, best first:
///
/// ```text
/// [1] policy.pdf (page 3): Refunds are processed ...
/// ```
///
/// Chunks are added whole until the next one would exceed `max_tokens`. A
/// first chunk larger than the whole budget is truncated rather than
/// dropped, so a non-empty retrieval never yields an empty context.
pub fn build_context(chunks: &[Chunk], max_tokens: usize, counter: &TokenCounter) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(chunks.len());
    let mut used = 0;

    for (i, chunk) in chunks.iter().enumerate() {
        let entry = format!(
            "[{}] {} (page {}): {}",
            i + 1,
            chunk.file_name,
            chunk.page_number,
            chunk.text.trim()
        );
        let tokens = counter.count(&entry);
        if used + tokens > max_tokens {
            if parts.is_empty() && max_tokens > 0 {
                parts.push(counter.truncate(&entry, max_tokens));
            }
            debug!(
                included = parts.len(),
                available = chunks.len(),
                "Context budget reached"
            );
            break;
        }
        used += tokens;
        parts.push(entry);
    }

    parts.join("\n\n")
}
