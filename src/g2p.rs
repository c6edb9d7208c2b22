//! Grapheme-to-phoneme conversion with subword alignment.
//!
//! A sentence is WordPiece-tokenized, the pieces are regrouped into whole
//! words, each word is run through the rule engine, and the resulting jamo
//! are spread back over the word's pieces.  The output carries one alignment
//! count per piece (plus the two sentinels) so that per-piece embeddings can
//! later be stretched to per-phone length.
//!
//! Invariants of every [`G2PResult`]:
//! - `phones.len() == phone_ids.len() == tones.len()`
//! - `word2ph.iter().sum() == phone_ids.len()`
//! - `word2ph.len() == pieces + 2`

use log::warn;
use serde::Serialize;

use crate::hangul;
use crate::rules::RuleEngine;
use crate::symbols::{id_or_unk, punctuation_id, PAD_ID, SENTINEL, UNK_ID};
use crate::wordpiece::{WordPieceTokenizer, CONTINUATION_PREFIX, UNK_TOKEN};

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Output of [`G2PConverter::convert`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct G2PResult {
    pub phones: Vec<String>,
    pub phone_ids: Vec<i64>,
    pub tones: Vec<i64>,
    pub word2ph: Vec<usize>,
}

/// One whole word: a leading piece and its `##` continuations, marker stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGroup {
    pub pieces: Vec<String>,
}

impl TokenGroup {
    pub fn text(&self) -> String {
        self.pieces.concat()
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }
}

/// Regroup a flat piece list.  A piece without the continuation marker opens
/// a new group; a leading orphan continuation also opens one.
pub fn group_pieces(pieces: &[String]) -> Vec<TokenGroup> {
    let mut groups: Vec<TokenGroup> = Vec::new();
    for piece in pieces {
        match (piece.strip_prefix(CONTINUATION_PREFIX), groups.last_mut()) {
            (Some(rest), Some(group)) => group.pieces.push(rest.to_string()),
            (Some(rest), None) => groups.push(TokenGroup { pieces: vec![rest.to_string()] }),
            (None, _) => groups.push(TokenGroup { pieces: vec![piece.clone()] }),
        }
    }
    groups
}

/// Spread `n_phone` units over `n_word` slots, one at a time, always to the
/// slot holding the fewest (ties to the lowest index).
///
/// ```
/// assert_eq!(melotts_ko::g2p::distribute(7, 3), vec![3, 2, 2]);
/// ```
pub fn distribute(n_phone: usize, n_word: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_word];
    if n_word == 0 {
        return counts;
    }
    for _ in 0..n_phone {
        let mut min_idx = 0;
        for (i, &c) in counts.iter().enumerate() {
            if c < counts[min_idx] {
                min_idx = i;
            }
        }
        counts[min_idx] += 1;
    }
    counts
}

// ─────────────────────────────────────────────────────────────────────────────
// G2PConverter
// ─────────────────────────────────────────────────────────────────────────────

pub struct G2PConverter {
    tokenizer: WordPieceTokenizer,
    engine: RuleEngine,
}

impl G2PConverter {
    pub fn new(tokenizer: WordPieceTokenizer, engine: RuleEngine) -> Self {
        Self { tokenizer, engine }
    }

    pub fn tokenizer(&self) -> &WordPieceTokenizer {
        &self.tokenizer
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// Phones of one group's text.  Unknown and punctuation groups yield a
    /// single phone; everything else goes through the rule engine.
    fn group_phones(&self, text: &str) -> Vec<(String, i64)> {
        if text == UNK_TOKEN {
            return vec![(UNK_TOKEN.to_string(), UNK_ID)];
        }
        if let Some(id) = punctuation_id(text) {
            return vec![(text.to_string(), id)];
        }
        let spoken = self.engine.convert(text);
        hangul::decompose(&spoken)
            .chars()
            .map(|c| (c.to_string(), id_or_unk(c)))
            .collect()
    }

    /// Convert one normalized sentence.
    pub fn convert(&self, text: &str) -> G2PResult {
        let pieces = self.tokenizer.tokenize(text);
        let groups = group_pieces(&pieces);

        let mut phones = vec![SENTINEL.to_string()];
        let mut phone_ids = vec![PAD_ID];
        let mut word2ph = vec![1usize];

        for group in &groups {
            let group_phones = self.group_phones(&group.text());
            let n_phone = group_phones.len();
            let n_word = group.len();

            if n_phone == 0 {
                warn!("G2P: {:?} produced no phones", group.text());
            }
            word2ph.extend(distribute(n_phone, n_word));
            for (phone, id) in group_phones {
                phones.push(phone);
                phone_ids.push(id);
            }
        }

        phones.push(SENTINEL.to_string());
        phone_ids.push(PAD_ID);
        word2ph.push(1);

        if word2ph.len() != pieces.len() + 2 {
            warn!(
                "G2P alignment mismatch: word2ph has {} entries for {} pieces",
                word2ph.len(),
                pieces.len()
            );
        }
        let total: usize = word2ph.iter().sum();
        if total != phone_ids.len() {
            warn!("G2P phone count mismatch: word2ph sums to {total}, {} phone ids", phone_ids.len());
        }

        let tones = vec![0; phone_ids.len()];
        G2PResult { phones, phone_ids, tones, word2ph }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn converter(words: &[&str]) -> G2PConverter {
        let mut vocab = vec!["[PAD]", "[UNK]", "[CLS]", "[SEP]"];
        vocab.extend_from_slice(words);
        G2PConverter::new(WordPieceTokenizer::from_tokens(vocab, true), RuleEngine::default())
    }

    fn check_invariants(r: &G2PResult, n_pieces: usize) {
        assert_eq!(r.phones.len(), r.phone_ids.len());
        assert_eq!(r.tones.len(), r.phone_ids.len());
        assert_eq!(r.word2ph.iter().sum::<usize>(), r.phone_ids.len());
        assert_eq!(r.word2ph.len(), n_pieces + 2);
        assert_eq!(r.phone_ids.first(), Some(&0));
        assert_eq!(r.phone_ids.last(), Some(&0));
    }

    #[test]
    fn test_distribute() {
        assert_eq!(distribute(7, 3), vec![3, 2, 2]);
        assert_eq!(distribute(2, 3), vec![1, 1, 0]);
        assert_eq!(distribute(0, 2), vec![0, 0]);
        assert_eq!(distribute(5, 0), Vec::<usize>::new());
    }

    #[test]
    fn test_distribute_is_fair() {
        for n_phone in 0..40 {
            for n_word in 1..8 {
                let d = distribute(n_phone, n_word);
                assert_eq!(d.len(), n_word);
                assert_eq!(d.iter().sum::<usize>(), n_phone);
                let (lo, hi) = (d.iter().min().unwrap(), d.iter().max().unwrap());
                assert!(hi - lo <= 1, "{n_phone}/{n_word}: {d:?}");
                assert!(*lo >= n_phone / n_word);
            }
        }
    }

    #[test]
    fn test_group_pieces() {
        let pieces: Vec<String> = ["안녕", "##하", "##세요", ".", "##x", "뭐"].iter().map(|s| s.to_string()).collect();
        let groups = group_pieces(&pieces);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].text(), "안녕하세요");
        assert_eq!(groups[1].pieces, vec![".", "x"]);
        assert_eq!(groups[2].text(), "뭐");
    }

    #[test]
    fn test_convert_alignment() {
        let g2p = converter(&["안녕", "##하세요", "."]);
        let r = g2p.convert("안녕하세요.");
        // "안녕하세요." is one whitespace word: no piece for "." inside it,
        // so the word falls back to [UNK]
        check_invariants(&r, 1);
        assert_eq!(r.phones, vec!["_", UNK_TOKEN, "_"]);
        assert_eq!(r.phone_ids, vec![0, UNK_ID, 0]);

        let r = g2p.convert("안녕하세요 .");
        check_invariants(&r, 3);
        // no rule fires on 안녕하세요: 12 jamo over 2 pieces
        assert_eq!(r.word2ph, vec![1, 6, 6, 1, 1]);
        assert_eq!(r.phones.last().map(String::as_str), Some("_"));
        assert_eq!(r.phones[r.phones.len() - 2], ".");
        assert_eq!(r.phone_ids[r.phone_ids.len() - 2], 214);
    }

    #[test]
    fn test_convert_applies_rules() {
        let g2p = converter(&["국", "##물"]);
        let r = g2p.convert("국물");
        check_invariants(&r, 2);
        // 궁물: ᄀ ᅮ ᆼ | ᄆ ᅮ ᆯ
        assert_eq!(r.phone_ids, vec![0, 162, 194, 208, 168, 194, 205, 0]);
        assert_eq!(r.word2ph, vec![1, 3, 3, 1]);
        assert!(r.tones.iter().all(|&t| t == 0));
    }

    #[test]
    fn test_long_unspaced_word_keeps_its_phones() {
        let g2p = converter(&["가", "##가"]);
        let r = g2p.convert(&"가".repeat(120));
        check_invariants(&r, 120);
        assert!(!r.phones.iter().any(|p| p == UNK_TOKEN));
        assert_eq!(r.phone_ids.len(), 2 * 120 + 2);
        assert!(r.word2ph[1..=120].iter().all(|&n| n == 2));
    }

    #[test]
    fn test_empty_input() {
        let g2p = converter(&[]);
        let r = g2p.convert("   ");
        check_invariants(&r, 0);
        assert_eq!(r.phones, vec!["_", "_"]);
    }

    #[test]
    fn test_result_serializes() {
        let r = converter(&["가"]).convert("가");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["word2ph"], serde_json::json!([1, 2, 1]));
        assert_eq!(json["phone_ids"], serde_json::json!([0, 162, 181, 0]));
    }
}
