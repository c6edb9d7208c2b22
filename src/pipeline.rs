//! Ordered concurrent sentence pipeline.
//!
//! Sentences are synthesized on a [`WorkerPool`] but always surface in input
//! order: results are collected strictly by index, so a sentence that
//! finishes early waits in its handle until every earlier one has been
//! delivered.
//!
//! | Schedule              | Submission                                         |
//! |-----------------------|----------------------------------------------------|
//! | [`Schedule::Batch`]   | every sentence up front, then collect in order     |
//! | [`Schedule::Pipelined`] | `window` sentences, then one more per collection |
//!
//! Cancellation is cooperative.  Each run owns one flag, checked before each
//! submission, before each wait, and by every task before it starts work.
//! It is set by [`SentencePipeline::stop`] (which reaches every run in
//! progress), by the progress callback returning `false`, or by a failed
//! sentence.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::pool::{TaskHandle, WorkerPool};
use crate::sentence::split_sentences;
use crate::tts::GeneratedAudio;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Batch,
    Pipelined { window: usize },
}

/// One unit of work handed to the synthesis closure.
#[derive(Debug, Clone)]
pub struct PipelineTask {
    pub index: usize,
    pub text: String,
}

/// Per-sentence work: text in, audio out.  Runs on a worker thread.
pub type SentenceWork = Arc<dyn Fn(&PipelineTask) -> anyhow::Result<GeneratedAudio> + Send + Sync>;

#[derive(Debug)]
pub enum StopReason {
    /// The progress callback returned `false`.
    Callback,
    /// [`SentencePipeline::stop`] was called.
    Requested,
    Failed(Error),
}

/// Everything collected by one run, complete or not.
#[derive(Debug)]
pub struct SynthesisOutcome {
    pub audio: GeneratedAudio,
    pub sentences_done: usize,
    pub sentences_total: usize,
    /// `None` when every sentence was delivered.
    pub stop_reason: Option<StopReason>,
}

impl SynthesisOutcome {
    pub fn is_complete(&self) -> bool {
        self.stop_reason.is_none()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Run state
// ─────────────────────────────────────────────────────────────────────────────

type PendingResult = Result<GeneratedAudio>;

/// Submission and collection cursors of one run.  `pending` holds the
/// handles of submitted but uncollected sentences, front = `next_collect`.
struct Run<'p> {
    pool: &'p WorkerPool,
    work: SentenceWork,
    cancel: Arc<AtomicBool>,
    sentences: Vec<String>,
    next_submit: usize,
    next_collect: usize,
    pending: VecDeque<TaskHandle<PendingResult>>,
}

impl Run<'_> {
    fn total(&self) -> usize {
        self.sentences.len()
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Submit the next sentence.  `Ok(false)` when there is nothing left to
    /// submit or the run is cancelled.
    fn submit_next(&mut self) -> Result<bool> {
        if self.cancelled() || self.next_submit >= self.total() {
            return Ok(false);
        }
        let index = self.next_submit;
        let task = PipelineTask { index, text: std::mem::take(&mut self.sentences[index]) };
        let work = Arc::clone(&self.work);
        let cancel = Arc::clone(&self.cancel);

        let handle = self.pool.execute(index, move || -> PendingResult {
            if cancel.load(Ordering::SeqCst) {
                return Err(Error::Cancelled);
            }
            work(&task).map_err(|e| Error::TaskFailed { index: task.index, message: format!("{e:#}") })
        })?;
        self.pending.push_back(handle);
        self.next_submit += 1;
        Ok(true)
    }

    fn submit_up_to(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            if !self.submit_next()? {
                break;
            }
        }
        Ok(())
    }

    /// Wait for the sentence at `next_collect`.
    fn collect_next(&mut self) -> Option<PendingResult> {
        let handle = self.pending.pop_front()?;
        self.next_collect += 1;
        Some(handle.wait().and_then(|r| r))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SentencePipeline
// ─────────────────────────────────────────────────────────────────────────────

pub struct SentencePipeline {
    pool: WorkerPool,
    schedule: Schedule,
    /// Cancel flags of the runs in progress, one per run.
    active: Mutex<Vec<Arc<AtomicBool>>>,
}

/// Registration of one run's flag; removed again when the run ends.
struct ActiveRun<'p> {
    active: &'p Mutex<Vec<Arc<AtomicBool>>>,
    flag: Arc<AtomicBool>,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.retain(|f| !Arc::ptr_eq(f, &self.flag));
    }
}

impl SentencePipeline {
    pub fn new(num_threads: usize, schedule: Schedule) -> Result<Self> {
        Ok(Self {
            pool: WorkerPool::new(num_threads)?,
            schedule,
            active: Mutex::new(Vec::new()),
        })
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn num_threads(&self) -> usize {
        self.pool.size()
    }

    /// Ask every run in progress to stop at its next check.  Idempotent; a
    /// run started afterwards is not affected.
    pub fn stop(&self) {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        for flag in active.iter() {
            flag.store(true, Ordering::SeqCst);
        }
    }

    /// Stop the current runs and join the workers.  Idempotent; later runs
    /// fail with [`Error::PoolStopped`].
    pub fn shutdown(&self) {
        self.stop();
        self.pool.shutdown();
    }

    /// Fresh flag for a new run.  Runs may overlap: a callback stop or a
    /// failure in one run never cancels another.
    fn register(&self) -> ActiveRun<'_> {
        let flag = Arc::new(AtomicBool::new(false));
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.push(Arc::clone(&flag));
        ActiveRun { active: &self.active, flag }
    }

    /// Split `text` into sentences and [`run`](Self::run) them.
    pub fn synthesize_text<F>(&self, text: &str, min_sentence_bytes: usize, work: SentenceWork, on_sentence: F) -> SynthesisOutcome
    where
        F: FnMut(&[f32], f32) -> bool,
    {
        self.run(split_sentences(text, min_sentence_bytes), work, on_sentence)
    }

    /// Synthesize `sentences` and deliver them in order.
    ///
    /// `on_sentence` receives each sentence's samples and the fraction of
    /// sentences delivered so far; returning `false` stops the run.  Partial
    /// audio is returned on every stop path.
    pub fn run<F>(&self, sentences: Vec<String>, work: SentenceWork, mut on_sentence: F) -> SynthesisOutcome
    where
        F: FnMut(&[f32], f32) -> bool,
    {
        let start = Instant::now();
        let total = sentences.len();
        let registration = self.register();
        let mut run = Run {
            pool: &self.pool,
            work,
            cancel: Arc::clone(&registration.flag),
            sentences,
            next_submit: 0,
            next_collect: 0,
            pending: VecDeque::new(),
        };
        info!(
            "pipeline: {total} sentences, {} threads, {:?}",
            self.pool.size(),
            self.schedule
        );

        let mut samples: Vec<f32> = Vec::new();
        let mut sample_rate = 0u32;
        let mut done = 0usize;
        let mut stop_reason = None;

        let (initial, refill) = match self.schedule {
            Schedule::Batch => (total, false),
            Schedule::Pipelined { window } => (window.max(1), true),
        };

        if let Err(e) = run.submit_up_to(initial) {
            run.cancel.store(true, Ordering::SeqCst);
            stop_reason = Some(StopReason::Failed(e));
        }

        while stop_reason.is_none() && run.next_collect < total {
            if run.cancelled() {
                stop_reason = Some(StopReason::Requested);
                break;
            }
            let Some(result) = run.collect_next() else {
                break;
            };
            match result {
                Ok(_) if run.cancelled() => {
                    stop_reason = Some(StopReason::Requested);
                }
                Ok(audio) => {
                    if sample_rate == 0 && !audio.samples.is_empty() {
                        sample_rate = audio.sample_rate;
                    }
                    done += 1;
                    samples.extend_from_slice(&audio.samples);
                    if !on_sentence(&audio.samples, done as f32 / total as f32) {
                        run.cancel.store(true, Ordering::SeqCst);
                        stop_reason = Some(StopReason::Callback);
                    }
                }
                Err(Error::Cancelled) => {
                    stop_reason = Some(StopReason::Requested);
                }
                Err(e) => {
                    warn!("pipeline: {e}; returning {done} of {total} sentences");
                    run.cancel.store(true, Ordering::SeqCst);
                    stop_reason = Some(StopReason::Failed(e));
                }
            }
            if stop_reason.is_none() && refill {
                if let Err(e) = run.submit_next() {
                    run.cancel.store(true, Ordering::SeqCst);
                    stop_reason = Some(StopReason::Failed(e));
                }
            }
        }

        info!(
            "pipeline: {done}/{total} sentences, {} samples in {:.2?}{}",
            samples.len(),
            start.elapsed(),
            match &stop_reason {
                Some(reason) => format!(" (stopped: {reason:?})"),
                None => String::new(),
            }
        );

        SynthesisOutcome {
            audio: GeneratedAudio { samples, sample_rate },
            sentences_done: done,
            sentences_total: total,
            stop_reason,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    /// Deterministic per-index latency in 0..8 ms.
    fn jitter(index: usize) -> Duration {
        let x = (index as u64).wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        Duration::from_millis((x >> 33) % 8)
    }

    /// Each sentence becomes `[index as f32; 3]` at 1 kHz.
    fn indexed_work() -> SentenceWork {
        Arc::new(|task: &PipelineTask| {
            thread::sleep(jitter(task.index));
            Ok(GeneratedAudio { samples: vec![task.index as f32; 3], sample_rate: 1000 })
        })
    }

    fn sentences(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("문장 {i}.")).collect()
    }

    fn run_collecting(pipeline: &SentencePipeline, n: usize, stop_after: Option<usize>) -> (SynthesisOutcome, Vec<usize>, Vec<f32>) {
        let mut seen = Vec::new();
        let mut progress = Vec::new();
        let outcome = pipeline.run(sentences(n), indexed_work(), |samples, p| {
            seen.push(samples[0] as usize);
            progress.push(p);
            stop_after.map_or(true, |k| seen.len() <= k)
        });
        (outcome, seen, progress)
    }

    #[test]
    fn test_order_is_preserved() {
        for schedule in [Schedule::Batch, Schedule::Pipelined { window: 3 }] {
            let pipeline = SentencePipeline::new(4, schedule).unwrap();
            let (outcome, seen, progress) = run_collecting(&pipeline, 20, None);
            assert!(outcome.is_complete());
            assert_eq!(seen, (0..20).collect::<Vec<_>>());
            assert_eq!(outcome.sentences_done, 20);
            assert_eq!(outcome.audio.samples.len(), 60);
            assert_eq!(outcome.audio.sample_rate, 1000);
            assert_eq!(progress.last().copied(), Some(1.0));
            assert!(progress.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_schedules_agree() {
        let batch = SentencePipeline::new(3, Schedule::Batch).unwrap();
        let piped = SentencePipeline::new(3, Schedule::Pipelined { window: 1 }).unwrap();
        let a = run_collecting(&batch, 9, None).0;
        let b = run_collecting(&piped, 9, None).0;
        assert_eq!(a.audio, b.audio);
    }

    #[test]
    fn test_callback_stop() {
        let pipeline = SentencePipeline::new(2, Schedule::Pipelined { window: 4 }).unwrap();
        // the callback returns false while handling sentence 3
        let (outcome, seen, _) = run_collecting(&pipeline, 12, Some(3));
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert!(matches!(outcome.stop_reason, Some(StopReason::Callback)));
        assert_eq!(outcome.sentences_done, 4);
        assert_eq!(outcome.audio.samples.len(), 12);

        // the next run starts with a fresh flag
        let (outcome, seen, _) = run_collecting(&pipeline, 3, None);
        assert!(outcome.is_complete());
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn test_callback_stop_with_everything_queued() {
        let pipeline = SentencePipeline::new(2, Schedule::Batch).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let work: SentenceWork = {
            let ran = Arc::clone(&ran);
            Arc::new(move |task: &PipelineTask| {
                ran.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                Ok(GeneratedAudio { samples: vec![task.index as f32; 3], sample_rate: 1000 })
            })
        };

        let start = Instant::now();
        let mut seen = Vec::new();
        let outcome = pipeline.run(sentences(60), work, |samples, _| {
            seen.push(samples[0] as usize);
            seen.len() <= 2
        });
        // 60 sentences × 20 ms on 2 workers would take 600 ms
        assert!(start.elapsed() < Duration::from_millis(400), "took {:?}", start.elapsed());
        assert_eq!(seen, vec![0, 1, 2]);
        assert!(matches!(outcome.stop_reason, Some(StopReason::Callback)));
        assert_eq!(outcome.sentences_done, 3);

        // queued tasks see the flag and skip their work
        pipeline.shutdown();
        assert!(ran.load(Ordering::SeqCst) < 60);
    }

    #[test]
    fn test_overlapping_runs_are_independent() {
        let pipeline = Arc::new(SentencePipeline::new(4, Schedule::Pipelined { window: 2 }).unwrap());
        let slow: SentenceWork = Arc::new(|task: &PipelineTask| {
            thread::sleep(Duration::from_millis(5));
            Ok(GeneratedAudio { samples: vec![task.index as f32], sample_rate: 1000 })
        });

        let other = {
            let pipeline = Arc::clone(&pipeline);
            let work = Arc::clone(&slow);
            thread::spawn(move || pipeline.run(sentences(10), work, |_, _| true))
        };
        // this run stops itself after the first sentence
        let stopped = pipeline.run(sentences(10), slow, |_, _| false);
        let completed = other.join().unwrap();

        assert!(matches!(stopped.stop_reason, Some(StopReason::Callback)));
        assert_eq!(stopped.sentences_done, 1);
        assert!(completed.is_complete());
        assert_eq!(completed.sentences_done, 10);
    }

    #[test]
    fn test_stop_reaches_every_run() {
        let pipeline = Arc::new(SentencePipeline::new(2, Schedule::Pipelined { window: 1 }).unwrap());
        let work: SentenceWork = Arc::new(|_: &PipelineTask| {
            thread::sleep(Duration::from_millis(20));
            Ok(GeneratedAudio { samples: vec![0.0], sample_rate: 1000 })
        });

        let runs: Vec<_> = (0..2)
            .map(|_| {
                let pipeline = Arc::clone(&pipeline);
                let work = Arc::clone(&work);
                thread::spawn(move || pipeline.run(sentences(100), work, |_, _| true))
            })
            .collect();
        thread::sleep(Duration::from_millis(60));
        pipeline.stop();

        for handle in runs {
            let outcome = handle.join().unwrap();
            assert!(matches!(outcome.stop_reason, Some(StopReason::Requested)));
            assert!(outcome.sentences_done < 100);
        }
        // a later run is unaffected
        assert!(pipeline.run(sentences(2), work, |_, _| true).is_complete());
    }

    #[test]
    fn test_task_failure_keeps_partial_audio() {
        let pipeline = SentencePipeline::new(2, Schedule::Batch).unwrap();
        let work: SentenceWork = Arc::new(|task: &PipelineTask| {
            if task.index == 2 {
                anyhow::bail!("synthesizer exploded");
            }
            Ok(GeneratedAudio { samples: vec![1.0; 2], sample_rate: 8000 })
        });
        let mut calls = 0;
        let outcome = pipeline.run(sentences(6), work, |_, _| {
            calls += 1;
            true
        });
        assert_eq!(calls, 2);
        assert_eq!(outcome.sentences_done, 2);
        assert_eq!(outcome.audio.samples.len(), 4);
        match outcome.stop_reason {
            Some(StopReason::Failed(Error::TaskFailed { index, message })) => {
                assert_eq!(index, 2);
                assert!(message.contains("exploded"));
            }
            other => panic!("unexpected stop reason {other:?}"),
        }
    }

    #[test]
    fn test_panicking_task_is_a_failure() {
        let pipeline = SentencePipeline::new(1, Schedule::Pipelined { window: 2 }).unwrap();
        let work: SentenceWork = Arc::new(|task: &PipelineTask| {
            if task.index == 1 {
                panic!("bad sentence");
            }
            Ok(GeneratedAudio { samples: vec![0.5], sample_rate: 8000 })
        });
        let outcome = pipeline.run(sentences(4), work, |_, _| true);
        assert_eq!(outcome.sentences_done, 1);
        assert!(matches!(outcome.stop_reason, Some(StopReason::Failed(Error::TaskPanicked { index: 1 }))));
    }

    #[test]
    fn test_stop_from_another_thread() {
        let pipeline = Arc::new(SentencePipeline::new(2, Schedule::Pipelined { window: 2 }).unwrap());
        let started = Arc::new(AtomicUsize::new(0));
        let work: SentenceWork = {
            let started = Arc::clone(&started);
            Arc::new(move |_: &PipelineTask| {
                started.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                Ok(GeneratedAudio { samples: vec![0.0; 10], sample_rate: 16000 })
            })
        };

        let stopper = {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                pipeline.stop();
            })
        };
        let outcome = pipeline.run(sentences(100), work, |_, _| true);
        stopper.join().unwrap();

        assert!(matches!(outcome.stop_reason, Some(StopReason::Requested)));
        assert!(outcome.sentences_done < 100);
        assert!(started.load(Ordering::SeqCst) < 100);
    }

    #[test]
    fn test_empty_input() {
        let pipeline = SentencePipeline::new(2, Schedule::Batch).unwrap();
        let outcome = pipeline.synthesize_text("   ", 30, indexed_work(), |_, _| panic!("no sentences"));
        assert!(outcome.is_complete());
        assert_eq!(outcome.sentences_total, 0);
        assert!(outcome.audio.samples.is_empty());
        assert_eq!(outcome.audio.sample_rate, 0);
    }

    #[test]
    fn test_run_after_shutdown_fails() {
        let pipeline = SentencePipeline::new(2, Schedule::Batch).unwrap();
        pipeline.shutdown();
        pipeline.shutdown();
        let (outcome, seen, _) = run_collecting(&pipeline, 3, None);
        assert!(seen.is_empty());
        assert!(matches!(outcome.stop_reason, Some(StopReason::Failed(Error::PoolStopped))));
    }
}
