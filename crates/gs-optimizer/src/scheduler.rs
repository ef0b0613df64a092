//! Fixed-size worker pool that executes sweep tasks.
//!
//! A producer thread streams tasks into a bounded queue, so at most
//! `queue_depth` pending tasks are held in memory regardless of how many the
//! sweep enumerates. `workers` routines on a dedicated rayon pool drain the
//! queue and report one [`ResultRecord`] per task; records are placed by
//! their explicit task index, so completion order does not matter.

use std::panic::{self, AssertUnwindSafe};

use crossbeam_channel::{bounded, unbounded};
use gs_types::{internal_error, GsError, GsResult, ResultRecord, TaskFailure};
use tracing::{debug, info, warn};

use crate::search::SweepTask;

/// Pending tasks buffered per worker.
const QUEUE_DEPTH_PER_WORKER: usize = 2;

/// Bounded pool of sweep workers.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    queue_depth: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> GsResult<Self> {
        if workers == 0 {
            return Err(GsError::Validation("worker pool needs at least one worker".into()));
        }
        Ok(Self {
            workers,
            queue_depth: workers * QUEUE_DEPTH_PER_WORKER,
        })
    }

    /// Override the submission queue capacity (minimum 1).
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Execute every task and return their records ordered by task index.
    ///
    /// Blocks until all tasks have finished. A task whose executor panics is
    /// recorded as failed; its siblings are unaffected. Task indices must
    /// cover `0..n` exactly once.
    pub fn run<I, F>(&self, tasks: I, execute: F) -> GsResult<Vec<ResultRecord>>
    where
        I: IntoIterator<Item = SweepTask>,
        I::IntoIter: Send,
        F: Fn(&SweepTask) -> ResultRecord + Sync,
    {
        let tasks = tasks.into_iter();
        let expected = tasks.size_hint().0;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("sweep-worker-{i}"))
            .build()
            .map_err(|e| internal_error!("failed to start worker pool: {}", e))?;

        let (task_tx, task_rx) = bounded::<SweepTask>(self.queue_depth);
        let (result_tx, result_rx) = unbounded::<ResultRecord>();

        info!(
            "Dispatching {} tasks to {} workers (queue depth {})",
            expected, self.workers, self.queue_depth
        );

        let execute = &execute;
        let pool = &pool;
        let workers = self.workers;

        std::thread::scope(|scope| {
            scope.spawn(move || {
                for task in tasks {
                    if task_tx.send(task).is_err() {
                        break;
                    }
                }
            });

            scope.spawn(move || {
                pool.scope(|s| {
                    for worker in 0..workers {
                        let task_rx = task_rx.clone();
                        let result_tx = result_tx.clone();
                        s.spawn(move |_| {
                            for task in task_rx.iter() {
                                let record = execute_guarded(worker, &task, execute);
                                if result_tx.send(record).is_err() {
                                    break;
                                }
                            }
                        });
                    }
                });
            });

            collect_records(result_rx.iter(), expected)
        })
    }
}

fn execute_guarded<F>(worker: usize, task: &SweepTask, execute: &F) -> ResultRecord
where
    F: Fn(&SweepTask) -> ResultRecord,
{
    debug!("Worker {} starting task {}", worker, task.index);
    match panic::catch_unwind(AssertUnwindSafe(|| execute(task))) {
        Ok(record) => record,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            warn!("Task {} panicked on worker {}: {}", task.index, worker, message);
            ResultRecord::failed(
                task.index,
                task.combination.names(),
                task.fold_counts(),
                TaskFailure::panicked(message),
            )
        }
    }
}

fn collect_records<I>(records: I, expected: usize) -> GsResult<Vec<ResultRecord>>
where
    I: Iterator<Item = ResultRecord>,
{
    let mut slots: Vec<Option<ResultRecord>> = Vec::with_capacity(expected);
    let progress_step = (expected / 20).max(1);
    let mut received = 0usize;

    for record in records {
        let index = record.index;
        if index >= slots.len() {
            slots.resize_with(index + 1, || None);
        }
        if slots[index].replace(record).is_some() {
            return Err(internal_error!("task {} reported more than once", index));
        }
        received += 1;
        if received % progress_step == 0 {
            info!("{}/{} tasks complete", received, expected.max(received));
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| slot.ok_or_else(|| internal_error!("no result for task {}", i)))
        .collect()
}
