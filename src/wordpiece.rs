//! Greedy longest-match WordPiece tokenizer.
//!
//! Text is split on whitespace, then every word is cut into the longest
//! vocabulary pieces from left to right.  Pieces after the first are looked
//! up with the `##` continuation prefix.  If some position has no matching
//! piece at all, the whole word becomes a single `[UNK]`.
//!
//! ```
//! use melotts_ko::wordpiece::{WordPieceTokenizer, BEGIN_ID, END_ID};
//!
//! let tok = WordPieceTokenizer::from_tokens(["[PAD]", "[UNK]", "[CLS]", "[SEP]", "안녕", "##하세요"], true);
//! let (pieces, ids) = tok.tokenize_with_ids("안녕하세요");
//! assert_eq!(pieces, ["안녕", "##하세요"]);
//! assert_eq!(ids, [BEGIN_ID, 4, 5, END_ID]);
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};

/// ID emitted before the first piece.
pub const BEGIN_ID: i64 = 2;
/// ID emitted after the last piece.
pub const END_ID: i64 = 3;

pub const UNK_TOKEN: &str = "[UNK]";
pub const CONTINUATION_PREFIX: &str = "##";

/// ID used for unknown pieces when the vocabulary itself has no `[UNK]` line.
pub const DEFAULT_UNK_ID: i64 = 1;

#[derive(Debug, Clone, Default)]
pub struct WordPieceTokenizer {
    vocab: HashMap<String, i64>,
    lower_case: bool,
}

impl WordPieceTokenizer {
    /// Load a newline-delimited vocabulary; line number = id.
    pub fn from_file(path: &Path, lower_case: bool) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read vocabulary: {}", path.display()))?;
        Ok(Self::from_vocab_str(&text, lower_case))
    }

    /// Like [`from_file`](Self::from_file) but never fails: a missing or
    /// unreadable file yields an empty vocabulary that maps every word to
    /// `[UNK]`.
    pub fn from_file_or_empty(path: &Path, lower_case: bool) -> Self {
        match Self::from_file(path, lower_case) {
            Ok(tok) => tok,
            Err(e) => {
                warn!("{e:#}; every word will tokenize to {UNK_TOKEN}");
                Self { vocab: HashMap::new(), lower_case }
            }
        }
    }

    pub fn from_vocab_str(text: &str, lower_case: bool) -> Self {
        Self::from_tokens(text.lines(), lower_case)
    }

    /// Build from tokens in id order.  A repeated token keeps its last id.
    pub fn from_tokens<I, S>(tokens: I, lower_case: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let vocab: HashMap<String, i64> = tokens
            .into_iter()
            .enumerate()
            .map(|(i, t)| (t.into(), i as i64))
            .collect();
        if vocab.is_empty() {
            warn!("WordPiece vocabulary is empty; every word will tokenize to {UNK_TOKEN}");
        } else {
            debug!("WordPiece vocabulary loaded: {} entries", vocab.len());
        }
        Self { vocab, lower_case }
    }

    pub fn len(&self) -> usize {
        self.vocab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocab.is_empty()
    }

    pub fn token_to_id(&self, token: &str) -> Option<i64> {
        self.vocab.get(token).copied()
    }

    pub fn unk_id(&self) -> i64 {
        self.token_to_id(UNK_TOKEN).unwrap_or(DEFAULT_UNK_ID)
    }

    /// Whitespace split, lower-casing first when enabled.
    pub fn basic_tokenize(&self, text: &str) -> Vec<String> {
        let text = if self.lower_case { text.to_lowercase() } else { text.to_string() };
        text.split_whitespace().map(str::to_string).collect()
    }

    /// Split one word into vocabulary pieces.
    pub fn wordpiece_tokenize(&self, word: &str) -> Vec<String> {
        let chars: Vec<(usize, char)> = word.char_indices().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let byte_at = |i: usize| chars.get(i).map_or(word.len(), |&(b, _)| b);
        let mut pieces = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let mut end = chars.len();
            let mut found = None;
            while start < end {
                let sub = &word[byte_at(start)..byte_at(end)];
                let candidate = if start > 0 {
                    format!("{CONTINUATION_PREFIX}{sub}")
                } else {
                    sub.to_string()
                };
                if self.vocab.contains_key(&candidate) {
                    found = Some(candidate);
                    break;
                }
                end -= 1;
            }
            match found {
                Some(piece) => pieces.push(piece),
                None => return vec![UNK_TOKEN.to_string()],
            }
            start = end;
        }
        pieces
    }

    /// All pieces of `text`, without begin/end markers.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.basic_tokenize(text)
            .iter()
            .flat_map(|word| self.wordpiece_tokenize(word))
            .collect()
    }

    /// Pieces plus their ids bracketed by [`BEGIN_ID`] / [`END_ID`], so
    /// `ids.len() == pieces.len() + 2`.
    pub fn tokenize_with_ids(&self, text: &str) -> (Vec<String>, Vec<i64>) {
        let pieces = self.tokenize(text);
        let unk = self.unk_id();
        let mut ids = Vec::with_capacity(pieces.len() + 2);
        ids.push(BEGIN_ID);
        ids.extend(pieces.iter().map(|p| self.token_to_id(p).unwrap_or(unk)));
        ids.push(END_ID);
        (pieces, ids)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer(words: &[&str]) -> WordPieceTokenizer {
        let mut vocab = vec!["[PAD]", "[UNK]", "[CLS]", "[SEP]"];
        vocab.extend_from_slice(words);
        WordPieceTokenizer::from_tokens(vocab, true)
    }

    #[test]
    fn test_greedy_longest_match() {
        let tok = tokenizer(&["안녕", "##하세요", "안", "##녕", "##하"]);
        assert_eq!(tok.wordpiece_tokenize("안녕하세요"), vec!["안녕", "##하세요"]);
        assert_eq!(tok.wordpiece_tokenize("안녕하"), vec!["안녕", "##하"]);
    }

    #[test]
    fn test_unknown_is_all_or_nothing() {
        let tok = tokenizer(&["안녕", "##하"]);
        // "안녕" matches but "##세" does not: no partial pieces survive
        assert_eq!(tok.wordpiece_tokenize("안녕하세"), vec![UNK_TOKEN]);
    }

    #[test]
    fn test_single_chars_never_unknown() {
        let text = "밟아요";
        let mut words: Vec<String> = Vec::new();
        for c in text.chars() {
            words.push(c.to_string());
            words.push(format!("##{c}"));
        }
        let tok = WordPieceTokenizer::from_tokens(words, true);
        let pieces = tok.wordpiece_tokenize(text);
        assert!(!pieces.iter().any(|p| p == UNK_TOKEN), "{pieces:?}");
        assert_eq!(pieces.len(), 3);
    }

    #[test]
    fn test_tokenize_with_ids() {
        let tok = tokenizer(&["안녕", "##하세요", "."]);
        let (pieces, ids) = tok.tokenize_with_ids("안녕하세요 . 뭐");
        assert_eq!(pieces, vec!["안녕", "##하세요", ".", UNK_TOKEN]);
        assert_eq!(ids, vec![BEGIN_ID, 4, 5, 6, 1, END_ID]);
    }

    #[test]
    fn test_lower_case_and_whitespace() {
        let tok = tokenizer(&["hello"]);
        assert_eq!(tok.basic_tokenize("  Hello\t\nWORLD "), vec!["hello", "world"]);
        assert_eq!(tok.tokenize("HELLO"), vec!["hello"]);

        let cased = WordPieceTokenizer::from_tokens(["Hello"], false);
        assert_eq!(cased.tokenize("Hello"), vec!["Hello"]);
    }

    #[test]
    fn test_empty_vocab_degrades() {
        let tok = WordPieceTokenizer::from_vocab_str("", true);
        assert!(tok.is_empty());
        let (pieces, ids) = tok.tokenize_with_ids("가 나");
        assert_eq!(pieces, vec![UNK_TOKEN, UNK_TOKEN]);
        assert_eq!(ids, vec![BEGIN_ID, DEFAULT_UNK_ID, DEFAULT_UNK_ID, END_ID]);
    }

    #[test]
    fn test_missing_file_degrades() {
        let path = std::env::temp_dir().join("melotts_ko_no_such_vocab.txt");
        assert!(WordPieceTokenizer::from_file(&path, true).is_err());
        let tok = WordPieceTokenizer::from_file_or_empty(&path, true);
        assert_eq!(tok.tokenize("가"), vec![UNK_TOKEN]);
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join("melotts_ko_vocab_test.txt");
        fs::write(&path, "[PAD]\n[UNK]\n[CLS]\n[SEP]\n가\n##나\n").unwrap();
        let tok = WordPieceTokenizer::from_file(&path, true).unwrap();
        assert_eq!(tok.len(), 6);
        assert_eq!(tok.tokenize_with_ids("가나").1, vec![BEGIN_ID, 4, 5, END_ID]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_long_unspaced_word_still_splits() {
        let tok = tokenizer(&["가", "##가"]);
        let long = "가".repeat(250);
        let pieces = tok.wordpiece_tokenize(&long);
        assert_eq!(pieces.len(), 250);
        assert_eq!(pieces[0], "가");
        assert!(pieces[1..].iter().all(|p| p == "##가"));
        assert!(!pieces.iter().any(|p| p == UNK_TOKEN));
    }
}
