//! Bounded worker pool that drives a run's tasks through the generation
//! client.
//!
//! All tasks of a run sit in one FIFO queue. A fixed number of workers
//! (`min(concurrency, tasks)`) each pop the next task, call the client,
//! record the outcome, and repeat until the queue is empty. Failures are
//! recorded per key and never stop the other workers.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use atelier_core::error::CoreError;
use atelier_core::types::{GenerationTask, ImageData, RunToken};
use atelier_generation::client::UNKNOWN_FAILURE_MESSAGE;
use atelier_generation::GenerationClient;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::store::ResultStore;

/// Concurrency limit used when none is configured.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Outcome counts of one bulk run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run: RunToken,
    pub total: usize,
    pub done: usize,
    pub failed: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    done: usize,
    failed: usize,
}

/// Runs task sets against a [`GenerationClient`], writing every outcome
/// into a shared [`ResultStore`].
pub struct TaskScheduler {
    client: Arc<dyn GenerationClient>,
    store: Arc<ResultStore>,
    concurrency: usize,
}

impl TaskScheduler {
    /// Fails with a validation error when `concurrency` is zero.
    pub fn new(
        client: Arc<dyn GenerationClient>,
        store: Arc<ResultStore>,
        concurrency: usize,
    ) -> Result<Self, CoreError> {
        if concurrency == 0 {
            return Err(CoreError::Validation(
                "Concurrency limit must be at least 1".into(),
            ));
        }
        Ok(Self {
            client,
            store,
            concurrency,
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every task and wait until each key is terminal.
    ///
    /// The store is reset to one `pending` record per key before any call
    /// is made. Individual failures are recorded as `error` and do not
    /// fail the run; only invalid input (duplicate keys) does.
    pub async fn run(&self, tasks: Vec<GenerationTask>) -> Result<RunSummary, CoreError> {
        check_unique_keys(&tasks)?;

        let keys: Vec<_> = tasks.iter().map(|t| t.key.clone()).collect();
        let run = self.store.reset(&keys).await;
        let total = tasks.len();
        let workers = self.concurrency.min(total);

        tracing::info!(run = %run, tasks = total, workers, "Starting generation run");

        let queue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let mut pool = JoinSet::new();
        for worker in 0..workers {
            pool.spawn(worker_loop(
                worker,
                run,
                Arc::clone(&queue),
                Arc::clone(&self.client),
                Arc::clone(&self.store),
            ));
        }

        let mut tally = Tally::default();
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(worker) => {
                    tally.done += worker.done;
                    tally.failed += worker.failed;
                }
                Err(e) => tracing::error!(run = %run, error = %e, "Worker task failed"),
            }
        }

        let summary = RunSummary {
            run,
            total,
            done: tally.done,
            failed: tally.failed,
        };
        tracing::info!(
            run = %run,
            done = summary.done,
            failed = summary.failed,
            "Generation run finished",
        );
        Ok(summary)
    }
}

fn check_unique_keys(tasks: &[GenerationTask]) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for task in tasks {
        if !seen.insert(task.key.as_str()) {
            return Err(CoreError::Validation(format!(
                "Duplicate task key '{}'",
                task.key
            )));
        }
    }
    Ok(())
}

/// Pop tasks until the queue is empty.
async fn worker_loop(
    worker: usize,
    run: RunToken,
    queue: Arc<Mutex<VecDeque<GenerationTask>>>,
    client: Arc<dyn GenerationClient>,
    store: Arc<ResultStore>,
) -> Tally {
    let mut tally = Tally::default();
    loop {
        let next = queue.lock().await.pop_front();
        let Some(task) = next else {
            break;
        };

        tracing::debug!(worker, key = %task.key, "Generating");
        let outcome = execute(&client, &task).await;
        match &outcome {
            Ok(_) => tally.done += 1,
            Err(message) => {
                tally.failed += 1;
                tracing::warn!(key = %task.key, error = %message, "Generation failed");
            }
        }
        store.complete(run, &task.key, outcome).await;
    }
    tally
}

/// Call the client for one task, turning every failure (including a panic
/// inside the client) into a human-readable message.
pub(crate) async fn execute(
    client: &Arc<dyn GenerationClient>,
    task: &GenerationTask,
) -> Result<ImageData, String> {
    let client = Arc::clone(client);
    let source = task.source.clone();
    let prompt = task.prompt.clone();
    let call = tokio::spawn(async move { client.generate(&source, &prompt).await });

    match call.await {
        Ok(Ok(image)) => Ok(image),
        Ok(Err(e)) => Err(e.describe()),
        Err(e) if e.is_panic() => Err(panic_message(e.into_panic())),
        Err(_) => Err(UNKNOWN_FAILURE_MESSAGE.to_string()),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .filter(|s| !s.trim().is_empty());
    match detail {
        Some(detail) => format!("Generation crashed: {detail}"),
        None => UNKNOWN_FAILURE_MESSAGE.to_string(),
    }
}
