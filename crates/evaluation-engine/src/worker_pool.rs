use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use planning_core::PlanningError;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

/// Cooperative cancellation shared between a caller and running tasks.
///
/// Tripped either explicitly or once the optional deadline passes.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Fixed-size pool of evaluation workers.
pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
}

impl WorkerPool {
    /// `workers == 0` sizes the pool to the available cores.
    pub fn new(workers: usize) -> Result<Self, PlanningError> {
        let workers = if workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            workers
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("eval-worker-{}", i))
            .build()
            .map_err(|e| PlanningError::InvalidConfig(format!("worker pool: {}", e)))?;
        debug!(workers, "Evaluation worker pool started");
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `task` over every item and return results aligned with `items`.
    ///
    /// A panicking task yields `Err(message)` in its slot. If the token is
    /// tripped before or during the run the whole batch is discarded.
    pub fn run<T, R, F>(
        &self,
        items: &[T],
        cancel: &CancellationToken,
        task: F,
    ) -> Result<Vec<Result<R, String>>, PlanningError>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        if cancel.is_cancelled() {
            return Err(PlanningError::Cancelled);
        }

        let slots: Vec<Option<Result<R, String>>> = self.pool.install(|| {
            items
                .par_iter()
                .map(|item| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    Some(catch_unwind(AssertUnwindSafe(|| task(item))).map_err(panic_message))
                })
                .collect()
        });

        if cancel.is_cancelled() {
            return Err(PlanningError::Cancelled);
        }
        slots
            .into_iter()
            .map(|slot| slot.ok_or(PlanningError::Cancelled))
            .collect()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker task panicked".to_string()
    }
}
