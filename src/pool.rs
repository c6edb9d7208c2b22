//! Fixed-size worker pool.
//!
//! Workers pull boxed jobs from one queue guarded by a `Mutex` + `Condvar`.
//! Each submitted closure gets its own result channel, returned to the caller
//! as a [`TaskHandle`]; waiting on a handle is the only place the caller
//! blocks.  A panic inside a job is caught and reported through the handle,
//! so one bad task never takes a worker down.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::error::{Error, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct Queue {
    jobs: VecDeque<Job>,
    stopped: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
}

impl Shared {
    /// The queue only holds plain data, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TaskHandle
// ─────────────────────────────────────────────────────────────────────────────

/// Result slot of one submitted task.
pub struct TaskHandle<T> {
    index: usize,
    rx: Receiver<std::thread::Result<T>>,
}

impl<T> TaskHandle<T> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Block until the task finishes.
    pub fn wait(self) -> Result<T> {
        match self.rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(Error::TaskPanicked { index: self.index }),
            // sender dropped without a value: the job never ran
            Err(_) => Err(Error::TaskLost { index: self.index }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WorkerPool
// ─────────────────────────────────────────────────────────────────────────────

pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    /// Start `size` workers (at least one).
    pub fn new(size: usize) -> Result<Self> {
        let size = size.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            available: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("melotts-ko-worker-{id}"))
                .spawn(move || worker_loop(&shared))?;
            workers.push(handle);
        }
        debug!("worker pool started with {size} threads");
        Ok(Self { shared, workers: Mutex::new(workers), size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.lock().stopped
    }

    /// Queue `job`.  `index` is only used to label errors.
    pub fn execute<F, T>(&self, index: usize, job: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let wrapped: Job = Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(job));
            // receiver gone means the caller stopped caring
            let _ = tx.send(outcome);
        });

        {
            let mut queue = self.shared.lock();
            if queue.stopped {
                return Err(Error::PoolStopped);
            }
            queue.jobs.push_back(wrapped);
        }
        self.shared.available.notify_one();
        Ok(TaskHandle { index, rx })
    }

    /// Stop accepting work, let workers drain the queue, and join them.
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        {
            let mut queue = self.shared.lock();
            queue.stopped = true;
        }
        self.shared.available.notify_all();

        let workers: Vec<JoinHandle<()>> = {
            let mut guard = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        for handle in workers {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!("failed to join {name}");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let job = {
            let mut queue = shared.lock();
            loop {
                if let Some(job) = queue.jobs.pop_front() {
                    break Some(job);
                }
                if queue.stopped {
                    break None;
                }
                queue = shared.available.wait(queue).unwrap_or_else(|e| e.into_inner());
            }
        };
        match job {
            Some(job) => job(),
            None => return,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_results_come_back_by_handle() {
        let pool = WorkerPool::new(3).unwrap();
        let handles: Vec<_> = (0..10)
            .map(|i| {
                pool.execute(i, move || {
                    thread::sleep(Duration::from_millis(((10 - i) * 2) as u64));
                    i * i
                })
                .unwrap()
            })
            .collect();
        let results: Vec<usize> = handles.into_iter().map(|h| h.wait().unwrap()).collect();
        assert_eq!(results, (0..10).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn test_minimum_one_worker() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.execute(0, || 7).unwrap().wait().unwrap(), 7);
    }

    #[test]
    fn test_panic_is_reported() {
        let pool = WorkerPool::new(1).unwrap();
        let bad = pool.execute(4, || -> i32 { panic!("boom") }).unwrap();
        assert!(matches!(bad.wait(), Err(Error::TaskPanicked { index: 4 })));
        // the worker survives
        assert_eq!(pool.execute(5, || 1).unwrap().wait().unwrap(), 1);
    }

    #[test]
    fn test_execute_after_shutdown() {
        let pool = WorkerPool::new(2).unwrap();
        pool.shutdown();
        assert!(pool.is_stopped());
        assert!(matches!(pool.execute(0, || ()), Err(Error::PoolStopped)));
        // idempotent
        pool.shutdown();
    }

    #[test]
    fn test_shutdown_drains_queued_jobs() {
        let pool = WorkerPool::new(1).unwrap();
        let handles: Vec<_> = (0..5).map(|i| pool.execute(i, move || i).unwrap()).collect();
        pool.shutdown();
        for (i, h) in handles.into_iter().enumerate() {
            assert_eq!(h.wait().unwrap(), i);
        }
    }
}
