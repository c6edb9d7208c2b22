//! # melotts-ko
//!
//! Korean text frontend for MeloTTS-style synthesizers: turns raw Korean
//! text into phoneme ids, tones and a subword→phoneme alignment, and runs
//! per-sentence synthesis on a worker pool while delivering audio strictly
//! in sentence order.
//!
//! ## Quick start
//!
//! ```
//! use melotts_ko::{G2PConverter, RuleEngine, WordPieceTokenizer};
//!
//! let vocab = ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "밟", "##아"];
//! let g2p = G2PConverter::new(
//!     WordPieceTokenizer::from_tokens(vocab, true),
//!     RuleEngine::default(),
//! );
//!
//! let r = g2p.convert("밟아");
//! assert_eq!(r.word2ph.len(), 2 + 2);
//! assert_eq!(r.word2ph.iter().sum::<usize>(), r.phone_ids.len());
//!
//! // pronunciation alone
//! assert_eq!(RuleEngine::default().convert("밟아"), "발바");
//! ```
//!
//! Synthesis is delegated to a [`Synthesizer`] implementation:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use melotts_ko::{FrontendConfig, KoreanTts, Synthesizer};
//! # fn model() -> Arc<dyn Synthesizer> { unimplemented!() }
//! let config = FrontendConfig::from_json_file("melo-ko.json".as_ref()).unwrap();
//! let tts = KoreanTts::from_config(&config, model()).unwrap();
//! let outcome = tts.generate_with_callback("안녕하세요. 반갑습니다.", 0, 1.0, |samples, progress| {
//!     println!("{} samples, {:.0}%", samples.len(), progress * 100.0);
//!     true
//! });
//! outcome.audio.write_wav("out.wav".as_ref()).unwrap();
//! ```
//!
//! ## Pipeline
//! 1. **Sentence split**: whitespace normalized, cut after `. ! ? … ,`, short pieces merged.
//! 2. **WordPiece**: greedy longest match, all-or-nothing `[UNK]`.
//! 3. **Rules**: digits spelled out, then ordered jamo passes and the coda+onset table.
//! 4. **Alignment**: each word's jamo spread over its subword pieces.
//! 5. **Blanks / tones / embedding** expansion per sentence.
//! 6. **Synthesis** on the worker pool, collected in sentence order.

pub mod config;
pub mod error;
pub mod frontend;
pub mod g2p;
pub mod hangul;
pub mod numerals;
pub mod pipeline;
pub mod pool;
pub mod rule_table;
pub mod rules;
pub mod sentence;
pub mod symbols;
pub mod tts;
pub mod wordpiece;

// C FFI for iOS / Android: frontend load / g2p / sentence split / free.
pub mod ffi;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use config::FrontendConfig;
pub use error::Error;
pub use frontend::{Embedding, EmbeddingModel, KoreanFrontend, TokenIds};
pub use g2p::{G2PConverter, G2PResult};
pub use pipeline::{Schedule, SentencePipeline, StopReason, SynthesisOutcome};
pub use rules::{RuleEngine, RuleEngineOptions};
pub use tts::{GeneratedAudio, KoreanTts, Synthesizer};
pub use wordpiece::WordPieceTokenizer;
