#[cfg(test)]
mod tests;

use tracing::debug;

/// Configuration for the token splitter.
#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Target chunk size in tokens.
    pub chunk_size: usize,
    /// Tokens shared between the tail of a chunk and the head of its
    /// successor.
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 20,
        }
    }
}

/// A token-bounded span of a document, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub text: String,
    pub chunk_index: usize,
    pub token_count: usize,
}

/// Split text into chunks that respect sentence boundaries where possible,
/// with the configured overlap carried from each chunk into the next.
pub fn split_text(text: &str, config: &SplitterConfig) -> Vec<TextChunk> {
    let mut units = Vec::new();
    for sentence in split_sentences(text) {
        if estimate_token_count(&sentence) > config.chunk_size {
            // A single sentence larger than the chunk budget falls back to
            // word-level pieces.
            units.extend(split_words(&sentence, config.chunk_size));
        } else {
            units.push(sentence);
        }
    }

    let mut chunks: Vec<TextChunk> = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0;

    for unit in units {
        let unit_tokens = estimate_token_count(&unit);

        if current_tokens + unit_tokens > config.chunk_size && !current.is_empty() {
            let overlap = overlap_tail(&current, config.chunk_overlap);
            push_chunk(&mut chunks, std::mem::take(&mut current));

            if !overlap.is_empty() {
                current_tokens = estimate_token_count(&overlap);
                current = overlap;
            } else {
                current_tokens = 0;
            }
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&unit);
        current_tokens += unit_tokens;
    }

    if !current.trim().is_empty() {
        push_chunk(&mut chunks, current);
    }

    debug!(
        "Split {} chars into {} chunks",
        text.len(),
        chunks.len()
    );

    chunks
}

fn push_chunk(chunks: &mut Vec<TextChunk>, text: String) {
    let chunk_index = chunks.len();
    let token_count = estimate_token_count(&text);
    chunks.push(TextChunk {
        text,
        chunk_index,
        token_count,
    });
}

/// Split text into sentences, keeping each sentence's own punctuation.
/// Paragraph breaks also end a sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();

    for paragraph in text.split("\n\n") {
        let mut current = String::new();
        let mut chars = paragraph.chars().peekable();

        while let Some(c) = chars.next() {
            current.push(c);
            if matches!(c, '.' | '!' | '?') {
                let boundary = chars.peek().is_none_or(|next| next.is_whitespace());
                if boundary {
                    let sentence = current.trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence.to_string());
                    }
                    current.clear();
                }
            }
        }

        let sentence = current.trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
    }

    sentences
}

/// Word-level fallback for oversized sentences.
fn split_words(text: &str, chunk_size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0;

    for word in text.split_whitespace() {
        let word_tokens = estimate_token_count(word).max(1);

        if current_tokens + word_tokens > chunk_size && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
            current_tokens = 0;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
        current_tokens += word_tokens;
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

/// The trailing words of a chunk that seed its successor. Word count stands
/// in for token count here; the two track closely at this overlap size.
pub(crate) fn overlap_tail(text: &str, overlap_tokens: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();

    if overlap_tokens == 0 || words.len() <= overlap_tokens {
        return String::new();
    }

    words[words.len() - overlap_tokens..].join(" ")
}

/// Estimate token count using a simple heuristic: roughly 0.75 words per
/// token for prose, with a small surcharge for punctuation.
pub fn estimate_token_count(text: &str) -> usize {
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}
