//! Per-sentence model input: G2P, blank interspersion, tones and the
//! optional contextual embedding.
//!
//! | Field       | Length (add_blank)  | Content                              |
//! |-------------|---------------------|--------------------------------------|
//! | `tokens`    | `2 * phones + 1`    | phone ids with 0 between and around  |
//! | `tones`     | same as `tokens`    | 0 on blanks, `tone_id` on phones     |
//! | `embedding` | `hidden * tokens`   | hidden-major, one column per token   |

use std::sync::Arc;

use anyhow::{Context, Result};
use log::warn;

use crate::config::FrontendConfig;
use crate::g2p::{G2PConverter, G2PResult};
use crate::rules::RuleEngine;
use crate::symbols::{blank_tones, intersperse_blank, intersperse_word2ph};
use crate::wordpiece::WordPieceTokenizer;

// ─────────────────────────────────────────────────────────────────────────────
// Embedding collaborator
// ─────────────────────────────────────────────────────────────────────────────

/// Token-level vectors, row-major `[seq_len × hidden]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub hidden: usize,
    pub data: Vec<f32>,
}

impl Embedding {
    pub fn seq_len(&self) -> usize {
        if self.hidden == 0 {
            0
        } else {
            self.data.len() / self.hidden
        }
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.hidden..(i + 1) * self.hidden]
    }
}

/// Contextual embedding model (e.g. a BERT encoder).  Receives the WordPiece
/// ids including the begin/end markers and returns one row per id.
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, token_ids: &[i64]) -> Result<Embedding>;
}

/// Repeat row `i` of `embedding` `word2ph[i]` times and lay the result out
/// hidden-major (`[hidden × sum(word2ph)]`).
///
/// Returns `None`, with a warning, when the row count does not match
/// `word2ph`.
pub fn expand_embedding(embedding: &Embedding, word2ph: &[usize]) -> Option<Vec<f32>> {
    let seq_len = embedding.seq_len();
    if embedding.hidden == 0 || embedding.data.len() != seq_len * embedding.hidden {
        warn!(
            "embedding of {} values does not divide into rows of {}",
            embedding.data.len(),
            embedding.hidden
        );
        return None;
    }
    if seq_len != word2ph.len() {
        warn!("embedding has {seq_len} rows but word2ph has {} entries; dropping it", word2ph.len());
        return None;
    }

    let n_phones: usize = word2ph.iter().sum();
    let hidden = embedding.hidden;
    let mut out = vec![0.0f32; hidden * n_phones];
    let mut col = 0;
    for (i, &count) in word2ph.iter().enumerate() {
        let row = embedding.row(i);
        for _ in 0..count {
            for (h, &v) in row.iter().enumerate() {
                out[h * n_phones + col] = v;
            }
            col += 1;
        }
    }
    Some(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// TokenIds
// ─────────────────────────────────────────────────────────────────────────────

/// Model input for one sentence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenIds {
    pub tokens: Vec<i64>,
    pub tones: Vec<i64>,
    pub embedding: Option<Vec<f32>>,
    pub sentence: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// KoreanFrontend
// ─────────────────────────────────────────────────────────────────────────────

pub struct KoreanFrontend {
    g2p: G2PConverter,
    add_blank: bool,
    tone_id: i64,
    embedder: Option<Arc<dyn EmbeddingModel>>,
}

impl KoreanFrontend {
    pub fn new(g2p: G2PConverter, add_blank: bool, tone_id: i64) -> Self {
        Self { g2p, add_blank, tone_id, embedder: None }
    }

    /// Build tokenizer and rule engine from `config`.  A missing or
    /// unreadable vocabulary is logged and leaves every word unknown.
    pub fn from_config(config: &FrontendConfig) -> Self {
        let tokenizer = match &config.vocab_path {
            Some(path) => WordPieceTokenizer::from_file_or_empty(path, config.lower_case),
            None => {
                warn!("no vocabulary configured; every word will be unknown");
                WordPieceTokenizer::from_tokens(Vec::<String>::new(), config.lower_case)
            }
        };
        let engine = RuleEngine::new(config.rule_options());
        Self::new(G2PConverter::new(tokenizer, engine), config.add_blank, config.tone_id)
    }

    pub fn with_embedding_model(mut self, model: Arc<dyn EmbeddingModel>) -> Self {
        self.embedder = Some(model);
        self
    }

    pub fn g2p(&self) -> &G2PConverter {
        &self.g2p
    }

    /// Plain G2P, without blanks or embedding.
    pub fn convert(&self, sentence: &str) -> G2PResult {
        self.g2p.convert(sentence)
    }

    /// Full model input for one sentence.
    pub fn token_ids(&self, sentence: &str) -> Result<TokenIds> {
        let G2PResult { phone_ids, word2ph, .. } = self.g2p.convert(sentence);

        let (tokens, word2ph, tones) = if self.add_blank {
            let tokens = intersperse_blank(&phone_ids);
            let tones = blank_tones(tokens.len(), self.tone_id);
            (tokens, intersperse_word2ph(&word2ph), tones)
        } else {
            let tones = vec![self.tone_id; phone_ids.len()];
            (phone_ids, word2ph, tones)
        };

        let embedding = match &self.embedder {
            Some(model) => {
                let (_, ids) = self.g2p.tokenizer().tokenize_with_ids(sentence);
                let embedding = model
                    .embed(&ids)
                    .with_context(|| format!("Embedding failed for {sentence:?}"))?;
                expand_embedding(&embedding, &word2ph)
            }
            None => None,
        };

        Ok(TokenIds { tokens, tones, embedding, sentence: sentence.to_string() })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
