//! Basic melotts-ko example: runs the Korean frontend and the ordered
//! sentence pipeline with a toy synthesizer that renders each phone as a
//! short tone.
//!
//! Usage:
//!   cargo run --example basic
//!   cargo run --example basic -- --vocab vocab.txt --text "안녕하세요. 반갑습니다!"
//!   RUST_LOG=debug cargo run --example basic     # show every rule that fires

use std::f32::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use melotts_ko::{FrontendConfig, GeneratedAudio, KoreanTts, Synthesizer, TokenIds};

const SAMPLE_RATE: u32 = 16_000;
/// Samples per phone at speed 1.0.
const PHONE_SAMPLES: usize = 800;

/// Maps every non-blank token to a sine burst whose pitch follows the id.
struct ToneSynth;

impl Synthesizer for ToneSynth {
    fn num_speakers(&self) -> usize {
        1
    }

    fn synthesize(&self, input: &TokenIds, _speaker_id: i64, speed: f32) -> anyhow::Result<GeneratedAudio> {
        let len = (PHONE_SAMPLES as f32 / speed.max(0.1)) as usize;
        let mut samples = Vec::new();
        for &id in input.tokens.iter().filter(|&&id| id != 0) {
            let freq = 200.0 + id as f32;
            samples.extend((0..len).map(|n| 0.3 * (2.0 * PI * freq * n as f32 / SAMPLE_RATE as f32).sin()));
        }
        Ok(GeneratedAudio { samples, sample_rate: SAMPLE_RATE })
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // ── Parse simple CLI arguments ───────────────────────────────────────────
    let mut args = std::env::args().skip(1);

    let mut config_path: Option<PathBuf> = None;
    let mut vocab: Option<PathBuf> = None;
    let mut text = "오늘 날씨가 정말 좋네요. 같이 산책하러 갈까요? 3시에 만나요!".to_string();
    let mut output = "output.wav".to_string();
    let mut speed = 1.0f32;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config_path = args.next().map(PathBuf::from),
            "--vocab" => vocab = args.next().map(PathBuf::from),
            "--text" => { if let Some(v) = args.next() { text = v; } }
            "--output" => { if let Some(v) = args.next() { output = v; } }
            "--speed" => { if let Some(v) = args.next() { speed = v.parse().unwrap_or(1.0); } }
            "--help" => {
                println!("Usage: basic [--config FILE] [--vocab FILE] [--text TEXT] [--output FILE] [--speed FLOAT]");
                return Ok(());
            }
            _ => {}
        }
    }

    let mut config = match &config_path {
        Some(path) => FrontendConfig::from_json_file(path)?,
        None => FrontendConfig::default(),
    };
    if vocab.is_some() {
        config.vocab_path = vocab;
    }

    let tts = KoreanTts::from_config(&config, Arc::new(ToneSynth))?;

    println!("Pronunciation: {}", tts.frontend().g2p().engine().convert(&text));

    let outcome = tts.generate_with_callback(&text, 0, speed, |samples, progress| {
        println!("  {:>5.1}%  {} samples", progress * 100.0, samples.len());
        true
    });
    println!(
        "{}/{} sentences, {:.2} s of audio",
        outcome.sentences_done,
        outcome.sentences_total,
        outcome.audio.duration_secs()
    );

    outcome.audio.write_wav(Path::new(&output))?;
    Ok(())
}
