//! Sentence splitter for the synthesis pipeline.
//!
//! Whitespace is collapsed, the text is cut after every run of `. ! ? … ,`
//! that ends a word, and neighbouring fragments are merged until each piece
//! is at least `min_bytes` long.  A short remainder at the end is glued onto
//! the previous piece instead of being synthesized on its own.
//!
//! Punctuation inside a word (`3.14`, `1,000`) is not a split point.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default minimum sentence length in UTF-8 bytes (about ten syllables).
pub const DEFAULT_MIN_SENTENCE_BYTES: usize = 30;

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?…,]+(?:\s|$)").unwrap());

/// Collapse every whitespace run to one space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    RE_SPACES.replace_all(text.trim(), " ").into_owned()
}

/// Cut normalized text after each break run.  Fragments keep their
/// punctuation and never start or end with a space.
fn fragments(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut last = 0;
    for m in RE_BREAK.find_iter(text) {
        let frag = text[last..m.end()].trim();
        if !frag.is_empty() {
            out.push(frag);
        }
        last = m.end();
    }
    let rest = text[last..].trim();
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}

/// Split `text` into sentences of at least `min_bytes` bytes where possible.
pub fn split_sentences(text: &str, min_bytes: usize) -> Vec<String> {
    let text = normalize_whitespace(text);
    let mut sentences: Vec<String> = Vec::new();
    let mut current = String::new();

    for frag in fragments(&text) {
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(frag);
        if current.len() >= min_bytes {
            sentences.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        match sentences.last_mut() {
            Some(last) => {
                last.push(' ');
                last.push_str(&current);
            }
            None => sentences.push(current),
        }
    }
    sentences
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
