//! 🚚 Reindex Orchestrator — the moving truck, driven by someone else, tracked by us.
//!
//! 🎬 *[INT. DESTINATION CLUSTER — a task id is born. it will be polled thirty seconds
//! at a time until it either finishes or someone loses patience.]*
//!
//! The destination cluster does all the copying: one async, sliced, throttled remote
//! reindex per index. We submit it, then poll its status on a fixed interval. Nothing here
//! runs in parallel. Parallelism is the cluster's job, requested through `slices`.
//!
//! 🧠 State machine:
//! ```text
//! Created ──submit──▶ Submitted ──first poll──▶ Polling ──┬──▶ Completed   (remote says done)
//!    │                    │                              ├──▶ Failed      (transport error, task error)
//!    └──▶ Failed          └──▶ Failed                    ├──▶ TimedOut    (deadline passed)
//!         (count/submit)       (first poll blew up)      └──▶ Cancelled   (token fired)
//! ```
//! `Completed` means the remote completion signal was seen. Document-level failures do not
//! change that; they ride along in `failures` and the caller decides what they mean.
//! `TimedOut` and `Cancelled` can strike from any state, mid-call included. They cancel the
//! remote task if one was submitted and abandon the destination index per [`AbandonPolicy`].
//! Cutover never runs for either.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backends::Cluster;
use crate::common::{ReindexRequest, RemoteSource, Throughput};
use crate::errors::MigrationError;
use crate::progress::{ReindexProgress, format_number};

// ============================================================
//  ⚙️ Config
// ============================================================

/// 🗑️ What happens to a destination index whose copy was cut short.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbandonPolicy {
    /// Leave it as it is, half full, for a human to look at.
    #[default]
    Keep,
    /// Delete it so the next run starts clean.
    Delete,
}

/// 🔧 The `[reindex]` section.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ReindexConfig {
    /// Sub-tasks the destination cluster spawns for one copy.
    #[serde(default = "default_slices")]
    pub slices: u32,
    /// Documents per scroll batch pulled from the source.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Docs/s cap. Absent, zero or negative means unlimited.
    #[serde(default)]
    pub requests_per_second: Option<f64>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Give up on one task after this long. Absent means wait forever.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
    #[serde(default)]
    pub on_abandon: AbandonPolicy,
}

fn default_slices() -> u32 {
    4
}

fn default_batch_size() -> u32 {
    1000
}

fn default_poll_interval_secs() -> u64 {
    30
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            slices: default_slices(),
            batch_size: default_batch_size(),
            requests_per_second: None,
            poll_interval_secs: default_poll_interval_secs(),
            deadline_secs: None,
            on_abandon: AbandonPolicy::default(),
        }
    }
}

impl ReindexConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    pub fn throughput(&self) -> Throughput {
        Throughput::from_config(self.requests_per_second)
    }
}

// ============================================================
//  🚦 Task bookkeeping
// ============================================================

/// 🚦 Where one reindex task is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Submitted,
    Polling,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::TimedOut | TaskState::Cancelled
        )
    }
}

/// 📋 One index's copy, from request to verdict.
#[derive(Debug, Clone)]
pub struct ReindexTask {
    pub task_id: Option<String>,
    pub source_index: String,
    pub dest_index: String,
    pub slices: u32,
    pub batch_size: u32,
    pub throughput: Throughput,
    pub state: TaskState,
    /// Documents the task wrote fresh.
    pub created: u64,
    /// Documents the task overwrote because the destination already had them.
    pub updated: u64,
    pub total: u64,
    /// Source document count at submission.
    pub expected_total: Option<u64>,
    pub failures: Vec<Value>,
    /// Why the task is `Failed`.
    pub error: Option<MigrationError>,
}

impl ReindexTask {
    pub fn new(source_index: &str, dest_index: &str, config: &ReindexConfig) -> Self {
        Self {
            task_id: None,
            source_index: source_index.to_string(),
            dest_index: dest_index.to_string(),
            slices: config.slices,
            batch_size: config.batch_size,
            throughput: config.throughput(),
            state: TaskState::Created,
            created: 0,
            updated: 0,
            total: 0,
            expected_total: None,
            failures: Vec::new(),
            error: None,
        }
    }

    /// 📦 Everything that landed in the destination, fresh or overwritten.
    pub fn copied(&self) -> u64 {
        self.created + self.updated
    }

    fn transition(&mut self, next: TaskState) {
        debug!(
            "🚦 '{}' → '{}': {:?} → {:?}",
            self.source_index, self.dest_index, self.state, next
        );
        self.state = next;
    }

    fn fail(&mut self, cause: MigrationError) {
        error!(
            "💀 Reindex '{}' → '{}' failed: {}",
            self.source_index, self.dest_index, cause
        );
        self.error = Some(cause);
        self.transition(TaskState::Failed);
    }

    /// 🏷️ The task's verdict as an error, if it isn't a clean success.
    ///
    /// `Completed` with document failures is a `PartialDataFailure`; `TimedOut` and
    /// `Cancelled` are `Fatal` for this index.
    pub fn verdict(&self) -> Result<(), MigrationError> {
        match self.state {
            TaskState::Completed if self.failures.is_empty() => Ok(()),
            TaskState::Completed => Err(MigrationError::PartialDataFailure {
                index: self.dest_index.clone(),
                created: self.copied(),
                total: self.total,
                failures: self.failures.len(),
            }),
            TaskState::Failed => Err(self.error.clone().unwrap_or_else(|| {
                MigrationError::fatal(format!("reindex into '{}'", self.dest_index), "unknown failure")
            })),
            TaskState::TimedOut => Err(MigrationError::fatal(
                format!("reindex into '{}'", self.dest_index),
                "deadline passed before the remote task completed; task cancelled",
            )),
            TaskState::Cancelled => Err(MigrationError::fatal(
                format!("reindex into '{}'", self.dest_index),
                "cancelled before the remote task completed",
            )),
            TaskState::Created | TaskState::Submitted | TaskState::Polling => Err(MigrationError::fatal(
                format!("reindex into '{}'", self.dest_index),
                format!("task stopped in non-terminal state {:?}", self.state),
            )),
        }
    }
}

// ============================================================
//  🚚 The orchestrator
// ============================================================

/// 🚚 Drives reindex tasks from `source` into `destination`, one at a time.
#[derive(Debug)]
pub struct ReindexOrchestrator<'a> {
    pub source: &'a dyn Cluster,
    pub destination: &'a dyn Cluster,
    /// How the destination reaches the source.
    pub remote: RemoteSource,
    pub config: &'a ReindexConfig,
    pub cancel: CancellationToken,
}

enum Interruption {
    Deadline,
    Cancelled,
}

impl ReindexOrchestrator<'_> {
    /// 🚀 Copy `source_index` into `dest_index` and wait for a verdict.
    ///
    /// Always returns a task in a terminal state; failures are in the task, not in a `Result`.
    /// The deadline runs from here, and it and the token can cut in on any call to either
    /// cluster, not just on the sleeps between polls.
    pub async fn run(&self, source_index: &str, dest_index: &str) -> ReindexTask {
        let mut task = ReindexTask::new(source_index, dest_index, self.config);

        if self.cancel.is_cancelled() {
            task.transition(TaskState::Cancelled);
            return task;
        }
        let deadline = self.deadline_from_now();

        let counted = match self.interruptible(deadline, self.source.count_documents(source_index)).await {
            Ok(counted) => counted,
            Err(interruption) => {
                self.interrupt(&mut task, None, interruption).await;
                return task;
            }
        };
        match counted {
            Ok(count) => task.expected_total = Some(count),
            Err(cause) => {
                task.fail(cause);
                return task;
            }
        }

        let request = ReindexRequest {
            remote: self.remote.clone(),
            source_index: task.source_index.clone(),
            dest_index: task.dest_index.clone(),
            batch_size: task.batch_size,
            slices: task.slices,
            throughput: task.throughput,
        };
        let submitted = match self.interruptible(deadline, self.destination.submit_reindex(&request)).await {
            Ok(submitted) => submitted,
            Err(interruption) => {
                self.interrupt(&mut task, None, interruption).await;
                return task;
            }
        };
        let task_id = match submitted {
            Ok(task_id) => task_id,
            Err(cause) => {
                task.fail(cause);
                return task;
            }
        };
        info!(
            "🚚 Reindex '{}' → '{}' submitted as task '{}' ({} slice(s), batch {}, {} docs/s)",
            source_index,
            dest_index,
            task_id,
            task.slices,
            task.batch_size,
            match task.throughput {
                Throughput::Unlimited => "unlimited".to_string(),
                Throughput::DocsPerSecond(rate) => rate.to_string(),
            }
        );
        task.task_id = Some(task_id.clone());
        task.transition(TaskState::Submitted);

        self.poll_until_terminal(&mut task, &task_id, deadline).await;
        task
    }

    // -- ⌛ a deadline too far out to represent is no deadline at all
    fn deadline_from_now(&self) -> Option<Instant> {
        let after = self.config.deadline()?;
        let at = Instant::now().checked_add(after);
        if at.is_none() {
            warn!(
                "⌛ A {}s deadline lands past the end of time; waiting without one",
                after.as_secs()
            );
        }
        at
    }

    async fn poll_until_terminal(&self, task: &mut ReindexTask, task_id: &str, deadline: Option<Instant>) {
        let mut progress =
            ReindexProgress::new(&task.source_index, &task.dest_index, task.expected_total.unwrap_or(0));

        loop {
            let polled = match self.interruptible(deadline, self.destination.get_task(task_id)).await {
                Ok(polled) => polled,
                Err(interruption) => {
                    self.interrupt(task, Some(task_id), interruption).await;
                    break;
                }
            };
            match polled {
                Err(cause) => {
                    task.fail(cause);
                    break;
                }
                Ok(status) => {
                    if task.state == TaskState::Submitted {
                        task.transition(TaskState::Polling);
                    }
                    task.created = status.created;
                    task.updated = status.updated;
                    task.total = status.total;
                    progress.observe(task.copied(), status.total);

                    if status.completed {
                        task.failures = status.failures;
                        match status.error {
                            Some(reason) => task.fail(MigrationError::fatal(
                                format!("reindex task '{task_id}'"),
                                format!("task completed with an error: {reason}"),
                            )),
                            None => self.complete(task),
                        }
                        break;
                    }
                    info!(
                        "⏳ '{}' → '{}': {}/{} ({:.1}%)",
                        task.source_index,
                        task.dest_index,
                        format_number(task.copied()),
                        format_number(task.total),
                        progress.percent()
                    );
                }
            }

            let slept = self
                .interruptible(deadline, tokio::time::sleep(self.config.poll_interval()))
                .await;
            if let Err(interruption) = slept {
                self.interrupt(task, Some(task_id), interruption).await;
                break;
            }
        }
        progress.finish();
    }

    // -- ⏲️ whoever gets there first: the token, the deadline, or the call itself
    async fn interruptible<F: std::future::Future>(
        &self,
        deadline: Option<Instant>,
        call: F,
    ) -> Result<F::Output, Interruption> {
        let deadline_reached = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interruption::Cancelled),
            _ = deadline_reached => Err(Interruption::Deadline),
            output = call => Ok(output),
        }
    }

    // -- 🛑 `task_id` is `None` when we were cut off before the cluster handed one back
    async fn interrupt(&self, task: &mut ReindexTask, task_id: Option<&str>, interruption: Interruption) {
        match interruption {
            Interruption::Deadline => {
                warn!(
                    "⌛ '{}' → '{}' missed its deadline at {}/{}",
                    task.source_index,
                    task.dest_index,
                    task.copied(),
                    task.total
                );
                task.transition(TaskState::TimedOut);
            }
            Interruption::Cancelled => {
                warn!(
                    "🛑 '{}' → '{}' cancelled at {}/{}",
                    task.source_index,
                    task.dest_index,
                    task.copied(),
                    task.total
                );
                task.transition(TaskState::Cancelled);
            }
        }
        self.abandon(task, task_id).await;
    }

    fn complete(&self, task: &mut ReindexTask) {
        match task.expected_total {
            Some(expected) if expected != task.total => warn!(
                "🔢 '{}' had {} documents at submission but the task reports a total of {}",
                task.source_index, expected, task.total
            ),
            _ => {}
        }
        if task.failures.is_empty() {
            info!(
                "✅ '{}' → '{}' complete: {}/{} documents ({} new, {} overwritten)",
                task.source_index,
                task.dest_index,
                format_number(task.copied()),
                format_number(task.total),
                format_number(task.created),
                format_number(task.updated)
            );
        } else {
            warn!(
                "⚠️ '{}' → '{}' complete with {} document failure(s): {}/{} documents",
                task.source_index,
                task.dest_index,
                task.failures.len(),
                format_number(task.copied()),
                format_number(task.total)
            );
        }
        task.transition(TaskState::Completed);
    }

    // -- 🗑️ best effort: the task may have finished on its own, the index may be gone already
    async fn abandon(&self, task: &ReindexTask, task_id: Option<&str>) {
        if let Some(task_id) = task_id {
            if let Err(cause) = self.destination.cancel_task(task_id).await {
                warn!("🛑 Couldn't cancel remote task '{}': {}", task_id, cause);
            }
        }
        match self.config.on_abandon {
            AbandonPolicy::Keep => info!(
                "🗑️ Keeping partially filled '{}' for inspection; no cutover for it",
                task.dest_index
            ),
            AbandonPolicy::Delete => match self.destination.delete_index(&task.dest_index).await {
                Ok(()) => info!("🗑️ Deleted abandoned '{}'", task.dest_index),
                Err(cause) => warn!("🗑️ Couldn't delete abandoned '{}': {}", task.dest_index, cause),
            },
        }
    }
}
