//! Frontend and pipeline configuration.
//!
//! Every field has a default, so `{}` is a valid config file:
//!
//! ```json
//! {
//!   "num_threads": 4,
//!   "schedule": "pipelined",
//!   "window": 6,
//!   "vocab_path": "/models/melo-ko/vocab.txt"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::pipeline::Schedule;
use crate::rules::RuleEngineOptions;
use crate::sentence::DEFAULT_MIN_SENTENCE_BYTES;

/// Tone slot the Korean acoustic model expects on every real phone.
pub const KOREAN_TONE_ID: i64 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    Batch,
    Pipelined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Worker threads; values below 1 are treated as 1.
    pub num_threads: usize,
    pub schedule: ScheduleKind,
    /// In-flight sentences for the pipelined schedule; `2 * num_threads` when unset.
    pub window: Option<usize>,
    /// Sentences shorter than this (in bytes) are merged with a neighbour.
    pub min_sentence_bytes: usize,
    pub lower_case: bool,
    /// Everyday pronunciation instead of the prescriptive standard.
    pub descriptive: bool,
    /// Intersperse blank (0) ids between phones.
    pub add_blank: bool,
    pub tone_id: i64,
    /// WordPiece vocabulary, one piece per line.
    pub vocab_path: Option<PathBuf>,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            num_threads: 2,
            schedule: ScheduleKind::Pipelined,
            window: None,
            min_sentence_bytes: DEFAULT_MIN_SENTENCE_BYTES,
            lower_case: true,
            descriptive: false,
            add_blank: true,
            tone_id: KOREAN_TONE_ID,
            vocab_path: None,
        }
    }
}

impl FrontendConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Cannot parse frontend config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config: {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.window == Some(0) {
            return Err(Error::Config("window must be at least 1".into()));
        }
        if self.tone_id < 0 {
            return Err(Error::Config(format!("tone_id must not be negative, got {}", self.tone_id)));
        }
        Ok(())
    }

    pub fn threads(&self) -> usize {
        self.num_threads.max(1)
    }

    pub fn pipeline_schedule(&self) -> Schedule {
        match self.schedule {
            ScheduleKind::Batch => Schedule::Batch,
            ScheduleKind::Pipelined => Schedule::Pipelined {
                window: self.window.unwrap_or(2 * self.threads()).max(1),
            },
        }
    }

    pub fn rule_options(&self) -> RuleEngineOptions {
        RuleEngineOptions { descriptive: self.descriptive }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        let c = FrontendConfig::from_json_str("{}").unwrap();
        assert_eq!(c, FrontendConfig::default());
        assert_eq!(c.pipeline_schedule(), Schedule::Pipelined { window: 4 });
        assert_eq!(c.tone_id, 11);
    }

    #[test]
    fn test_overrides() {
        let c = FrontendConfig::from_json_str(
            r#"{"num_threads": 0, "schedule": "batch", "descriptive": true, "vocab_path": "/tmp/v.txt"}"#,
        )
        .unwrap();
        assert_eq!(c.threads(), 1);
        assert_eq!(c.pipeline_schedule(), Schedule::Batch);
        assert!(c.rule_options().descriptive);
        assert_eq!(c.vocab_path.as_deref(), Some(Path::new("/tmp/v.txt")));
    }

    #[test]
    fn test_explicit_window() {
        let c = FrontendConfig::from_json_str(r#"{"num_threads": 3, "window": 5}"#).unwrap();
        assert_eq!(c.pipeline_schedule(), Schedule::Pipelined { window: 5 });
    }

    #[test]
    fn test_invalid_values() {
        assert!(FrontendConfig::from_json_str(r#"{"window": 0}"#).is_err());
        assert!(FrontendConfig::from_json_str(r#"{"tone_id": -1}"#).is_err());
        assert!(FrontendConfig::from_json_str(r#"{"schedule": "eager"}"#).is_err());
        assert!(FrontendConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_from_missing_file() {
        let err = FrontendConfig::from_json_file(Path::new("/nonexistent/melotts-ko.json")).unwrap_err();
        assert!(format!("{err:#}").contains("Cannot read config"));
    }
}
