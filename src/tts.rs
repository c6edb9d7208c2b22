//! Text → audio driver: frontend + synthesizer + ordered pipeline.
//!
//! The acoustic model itself is a collaborator behind [`Synthesizer`]; this
//! module only decides what it is fed and in which order the results come
//! back.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::config::FrontendConfig;
use crate::frontend::{KoreanFrontend, TokenIds};
use crate::pipeline::{PipelineTask, SentencePipeline, SentenceWork, SynthesisOutcome};

// ─────────────────────────────────────────────────────────────────────────────
// Audio
// ─────────────────────────────────────────────────────────────────────────────

/// Mono float samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl GeneratedAudio {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f32 / self.sample_rate as f32
        }
    }

    /// Write the samples as a 16-bit PCM WAV file.
    pub fn write_wav(&self, output_path: &Path) -> Result<()> {
        if self.sample_rate == 0 {
            anyhow::bail!("Cannot write WAV without a sample rate: {}", output_path.display());
        }
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(output_path, spec)
            .with_context(|| format!("Cannot create WAV: {}", output_path.display()))?;
        for &s in &self.samples {
            let s16 = (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            writer.write_sample(s16).context("WAV write error")?;
        }
        writer.finalize().context("WAV finalise error")?;
        info!(
            "Saved {} samples ({:.2} s) to {}",
            self.samples.len(),
            self.duration_secs(),
            output_path.display()
        );
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Synthesizer collaborator
// ─────────────────────────────────────────────────────────────────────────────

/// Acoustic model + vocoder.  Called from worker threads.
pub trait Synthesizer: Send + Sync {
    /// Speakers the model was trained with; 0 or 1 for single-speaker models.
    fn num_speakers(&self) -> usize;

    fn synthesize(&self, input: &TokenIds, speaker_id: i64, speed: f32) -> Result<GeneratedAudio>;
}

/// Clamp a requested speaker id to one the model accepts, falling back to 0.
pub fn resolve_speaker_id(speaker_id: i64, num_speakers: usize) -> i64 {
    if num_speakers == 0 {
        if speaker_id != 0 {
            warn!("model has no speaker table; ignoring speaker id {speaker_id} and using 0");
        }
        return 0;
    }
    if speaker_id < 0 || speaker_id as usize >= num_speakers {
        warn!("speaker id {speaker_id} is out of range 0..{num_speakers}; using 0");
        return 0;
    }
    speaker_id
}

// ─────────────────────────────────────────────────────────────────────────────
// KoreanTts
// ─────────────────────────────────────────────────────────────────────────────

pub struct KoreanTts {
    frontend: Arc<KoreanFrontend>,
    synthesizer: Arc<dyn Synthesizer>,
    pipeline: SentencePipeline,
    min_sentence_bytes: usize,
}

impl KoreanTts {
    pub fn new(config: &FrontendConfig, frontend: KoreanFrontend, synthesizer: Arc<dyn Synthesizer>) -> Result<Self> {
        config.validate()?;
        let pipeline = SentencePipeline::new(config.threads(), config.pipeline_schedule())
            .context("Cannot start synthesis workers")?;
        Ok(Self {
            frontend: Arc::new(frontend),
            synthesizer,
            pipeline,
            min_sentence_bytes: config.min_sentence_bytes,
        })
    }

    /// Frontend built from `config` (vocabulary, rule options, blanks).
    pub fn from_config(config: &FrontendConfig, synthesizer: Arc<dyn Synthesizer>) -> Result<Self> {
        Self::new(config, KoreanFrontend::from_config(config), synthesizer)
    }

    pub fn frontend(&self) -> &KoreanFrontend {
        &self.frontend
    }

    pub fn pipeline(&self) -> &SentencePipeline {
        &self.pipeline
    }

    /// Request the running generation to stop.
    pub fn stop(&self) {
        self.pipeline.stop();
    }

    fn work(&self, speaker_id: i64, speed: f32) -> SentenceWork {
        let frontend = Arc::clone(&self.frontend);
        let synthesizer = Arc::clone(&self.synthesizer);
        Arc::new(move |task: &PipelineTask| {
            let input = frontend.token_ids(&task.text)?;
            synthesizer
                .synthesize(&input, speaker_id, speed)
                .with_context(|| format!("Synthesis failed for sentence {}", task.index))
        })
    }

    /// Generate `text`, calling `on_sentence(samples, progress)` after each
    /// sentence in order.  Returning `false` stops generation.
    pub fn generate_with_callback<F>(&self, text: &str, speaker_id: i64, speed: f32, on_sentence: F) -> SynthesisOutcome
    where
        F: FnMut(&[f32], f32) -> bool,
    {
        let sid = resolve_speaker_id(speaker_id, self.synthesizer.num_speakers());
        self.pipeline
            .synthesize_text(text, self.min_sentence_bytes, self.work(sid, speed), on_sentence)
    }

    pub fn generate(&self, text: &str, speaker_id: i64, speed: f32) -> SynthesisOutcome {
        self.generate_with_callback(text, speaker_id, speed, |_, _| true)
    }

    /// Generate `text` and save whatever was produced to a WAV file.
    pub fn generate_to_file(&self, text: &str, output_path: &Path, speaker_id: i64, speed: f32) -> Result<SynthesisOutcome> {
        let outcome = self.generate(text, speaker_id, speed);
        outcome.audio.write_wav(output_path)?;
        Ok(outcome)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
