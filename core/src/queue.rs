//! The shared write-behind queue.
//!
//! Every persistence layer pushes into one [`TaskQueue`]. Tasks run strictly one at a time in push
//! order, across all collections, on a single drain loop that only exists while there is work.
//! Producers never wait for the store.

use std::{
    collections::VecDeque,
    panic::AssertUnwindSafe,
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
};

use futures::FutureExt;
use tokio::{runtime::Handle, sync::watch};
use tracing::debug;

use crate::{
    action_debug, action_error, action_warn,
    document::{Document, PrimaryKey},
    entity::EntityId,
    error::{QueueError, StorageError, TaskError},
    storage::CollectionHandle,
    task::spawn_on,
};

/// Environment variable read by [`QueueConfig::from_env`]
pub const FAILURE_POLICY_ENV: &str = "GRAPHMIRROR_FAILURE_POLICY";

/// What the drain loop does after a task fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop draining. The failed task is dropped, later tasks stay queued until [`TaskQueue::resume`].
    #[default]
    Halt,
    /// Report the failure and move on to the next task.
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = QueueError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "halt" | "stop" => Ok(FailurePolicy::Halt),
            "continue" => Ok(FailurePolicy::Continue),
            other => Err(QueueError::InvalidPolicy(other.to_owned())),
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Halt => write!(f, "halt"),
            FailurePolicy::Continue => write!(f, "continue"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Used in log lines only
    pub name: String,
    pub failure_policy: FailurePolicy,
}

impl Default for QueueConfig {
    fn default() -> Self { Self::fail_stop() }
}

impl QueueConfig {
    pub fn new(name: impl Into<String>, failure_policy: FailurePolicy) -> Self { Self { name: name.into(), failure_policy } }

    /// A failing store call halts the queue
    pub fn fail_stop() -> Self { Self::new("persistence", FailurePolicy::Halt) }

    /// Failures are reported and draining continues
    pub fn continue_on_failure() -> Self { Self::new("persistence", FailurePolicy::Continue) }

    /// Defaults, with the failure policy overridden by `GRAPHMIRROR_FAILURE_POLICY` when set.
    pub fn from_env() -> Result<Self, QueueError> {
        match std::env::var(FAILURE_POLICY_ENV) {
            Ok(policy) => Ok(Self { failure_policy: policy.parse()?, ..Self::default() }),
            Err(std::env::VarError::NotPresent) => Ok(Self::default()),
            Err(std::env::VarError::NotUnicode(raw)) => Err(QueueError::InvalidPolicy(raw.to_string_lossy().into_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    /// No drain loop is running and nothing is pending
    Idle,
    /// Exactly one drain loop is running
    Draining,
    /// A task failed under [`FailurePolicy::Halt`]; pending tasks are retained
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Insert,
    Replace,
    Delete,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Insert => write!(f, "insert"),
            OperationKind::Replace => write!(f, "replace"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// A store mutation whose payload was fixed when the task was created.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Insert { document: Document },
    Replace { key: PrimaryKey, document: Document },
    Delete { key: PrimaryKey },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Insert { .. } => OperationKind::Insert,
            Operation::Replace { .. } => OperationKind::Replace,
            Operation::Delete { .. } => OperationKind::Delete,
        }
    }
}

/// A deferred persistence operation bound to its target collection.
pub struct Task {
    collection: CollectionHandle,
    entity_id: EntityId,
    operation: Operation,
}

impl Task {
    pub fn new(collection: CollectionHandle, entity_id: EntityId, operation: Operation) -> Self { Self { collection, entity_id, operation } }

    pub fn insert(collection: CollectionHandle, entity_id: EntityId, document: Document) -> Self {
        Self::new(collection, entity_id, Operation::Insert { document })
    }

    pub fn replace(collection: CollectionHandle, entity_id: EntityId, key: PrimaryKey, document: Document) -> Self {
        Self::new(collection, entity_id, Operation::Replace { key, document })
    }

    pub fn delete(collection: CollectionHandle, entity_id: EntityId, key: PrimaryKey) -> Self {
        Self::new(collection, entity_id, Operation::Delete { key })
    }

    pub fn kind(&self) -> OperationKind { self.operation.kind() }

    pub fn entity_id(&self) -> &EntityId { &self.entity_id }

    pub fn operation(&self) -> &Operation { &self.operation }

    pub fn collection_name(&self) -> &str { self.collection.name() }

    /// Execute against the store, consuming the task.
    async fn run(self) -> Result<(), StorageError> {
        let Task { collection, entity_id, operation } = self;
        match operation {
            Operation::Insert { document } => {
                collection.insert_one(document).await?;
            }
            Operation::Replace { key, document } => {
                if !collection.replace_one(&key, document).await? {
                    debug!("{}: replace of {} matched no document", collection.name(), entity_id);
                }
            }
            Operation::Delete { key } => {
                if !collection.delete_one(&key).await? {
                    debug!("{}: delete of {} matched no document", collection.name(), entity_id);
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task({} {}/{})", self.kind(), self.collection.name(), self.entity_id)
    }
}

/// Report handed to failure handlers when a task does not complete.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    /// Position of the task in push order
    pub sequence: u64,
    pub collection: String,
    pub entity_id: EntityId,
    pub kind: OperationKind,
    pub error: Arc<TaskError>,
}

pub type FailureHandler = Arc<dyn Fn(&TaskFailure) + Send + Sync + 'static>;

/// The shared, ordered write-behind queue. Clones are handles to the same queue.
#[derive(Clone)]
pub struct TaskQueue(Arc<QueueInner>);

struct QueueInner {
    config: QueueConfig,
    runtime: Handle,
    state: Mutex<QueueState>,
    status: watch::Sender<QueueStatus>,
    failure_handlers: RwLock<Vec<FailureHandler>>,
    next_sequence: AtomicU64,
}

struct QueueState {
    pending: VecDeque<QueuedTask>,
    status: QueueStatus,
}

struct QueuedTask {
    sequence: u64,
    task: Task,
}

impl TaskQueue {
    /// Create a queue whose drain loop runs on the current tokio runtime.
    pub fn new(config: QueueConfig) -> Result<Self, QueueError> { Ok(Self::with_runtime(Handle::try_current()?, config)) }

    /// Create a queue whose drain loop runs on the given runtime. Tasks may then be pushed from any thread.
    pub fn with_runtime(runtime: Handle, config: QueueConfig) -> Self {
        let (status, _) = watch::channel(QueueStatus::Idle);
        Self(Arc::new(QueueInner {
            config,
            runtime,
            state: Mutex::new(QueueState { pending: VecDeque::new(), status: QueueStatus::Idle }),
            status,
            failure_handlers: RwLock::new(Vec::new()),
            next_sequence: AtomicU64::new(0),
        }))
    }

    pub fn config(&self) -> &QueueConfig { &self.0.config }

    /// Append a task at the tail. Starts the drain loop only if the queue was idle; never waits.
    /// Returns the task's sequence number.
    pub fn push(&self, task: Task) -> u64 {
        let (sequence, start) = {
            let mut state = self.lock_state();
            let sequence = self.0.next_sequence.fetch_add(1, Ordering::Relaxed);
            debug!("{} push #{} {:?}", self, sequence, task);
            state.pending.push_back(QueuedTask { sequence, task });
            let start = state.status == QueueStatus::Idle;
            if start {
                self.set_status(&mut state, QueueStatus::Draining);
            }
            (sequence, start)
        };
        if start {
            spawn_on(&self.0.runtime, self.clone().drain());
        }
        sequence
    }

    /// Number of tasks not yet started
    pub fn len(&self) -> usize { self.lock_state().pending.len() }

    pub fn is_empty(&self) -> bool { self.lock_state().pending.is_empty() }

    pub fn status(&self) -> QueueStatus { self.lock_state().status }

    /// Register a callback for task failures. Handlers run on the drain loop and must not block.
    pub fn on_failure(&self, handler: impl Fn(&TaskFailure) + Send + Sync + 'static) {
        self.0.failure_handlers.write().expect("Failed to lock failure handlers").push(Arc::new(handler));
    }

    /// Wait until no drain loop is running, returning the status it settled in (`Idle` or `Halted`).
    pub async fn wait_idle(&self) -> QueueStatus {
        let mut status = self.0.status.subscribe();
        let settled = match status.wait_for(|s| *s != QueueStatus::Draining).await {
            Ok(settled) => *settled,
            // The sender lives as long as `self`, so this is unreachable in practice
            Err(_) => self.status(),
        };
        settled
    }

    /// Restart a halted queue with whatever tasks it retained. Returns false if it was not halted.
    pub fn resume(&self) -> bool {
        let start = {
            let mut state = self.lock_state();
            if state.status != QueueStatus::Halted {
                return false;
            }
            let next = if state.pending.is_empty() { QueueStatus::Idle } else { QueueStatus::Draining };
            self.set_status(&mut state, next);
            next == QueueStatus::Draining
        };
        action_warn!(self, "resume");
        if start {
            spawn_on(&self.0.runtime, self.clone().drain());
        }
        true
    }

    #[cfg_attr(feature = "instrument", tracing::instrument(level = "debug", skip_all, fields(queue = %self.0.config.name)))]
    async fn drain(self) {
        action_debug!(self, "drain", "started");
        let mut guard = DrainGuard { queue: self.clone(), settled: false };
        while let Some(QueuedTask { sequence, task }) = self.next_task() {
            let (collection, entity_id, kind) = (task.collection_name().to_owned(), task.entity_id().clone(), task.kind());

            let error = match AssertUnwindSafe(task.run()).catch_unwind().await {
                Ok(Ok(())) => {
                    debug!("{} completed #{} {} {}/{}", self, sequence, kind, collection, entity_id);
                    continue;
                }
                Ok(Err(err)) => TaskError::Storage(err),
                Err(panic) => TaskError::Panicked(panic_message(panic.as_ref())),
            };

            let failure = TaskFailure { sequence, collection, entity_id, kind, error: Arc::new(error) };
            self.report(&failure);

            if self.0.config.failure_policy == FailurePolicy::Halt {
                guard.settled = true;
                let mut state = self.lock_state();
                action_error!(self, "halted", "{} task(s) retained", state.pending.len());
                self.set_status(&mut state, QueueStatus::Halted);
                return;
            }
        }
        guard.settled = true;
        action_debug!(self, "drain", "finished");
    }

    /// Pop the head, or mark the queue idle when there is nothing left. Both happen under one lock so
    /// a concurrent `push` either lands before the check or sees the idle status and starts a new loop.
    fn next_task(&self) -> Option<QueuedTask> {
        let mut state = self.lock_state();
        let next = state.pending.pop_front();
        if next.is_none() {
            self.set_status(&mut state, QueueStatus::Idle);
        }
        next
    }

    fn report(&self, failure: &TaskFailure) {
        action_error!(
            self,
            "task failed",
            "#{} {} {}/{}: {}",
            failure.sequence,
            failure.kind,
            failure.collection,
            failure.entity_id,
            failure.error
        );
        let handlers = self.0.failure_handlers.read().expect("Failed to lock failure handlers").clone();
        for handler in handlers {
            if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| handler(failure))) {
                action_error!(self, "failure handler panicked", "#{}: {}", failure.sequence, panic_message(panic.as_ref()));
            }
        }
    }

    fn set_status(&self, state: &mut QueueState, status: QueueStatus) {
        state.status = status;
        self.0.status.send_replace(status);
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, QueueState> { self.0.state.lock().expect("Failed to lock the task queue") }
}

/// Halts the queue when a drain loop is dropped before it settled, e.g. on runtime shutdown, so the
/// retained tasks can be picked up again with [`TaskQueue::resume`].
struct DrainGuard {
    queue: TaskQueue,
    settled: bool,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.queue.0.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        action_error!(self.queue, "drain aborted", "{} task(s) retained", state.pending.len());
        self.queue.set_status(&mut state, QueueStatus::Halted);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

impl std::fmt::Display for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "TaskQueue({})", self.0.config.name) }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        write!(f, "TaskQueue({}, {:?}, {} pending)", self.0.config.name, state.status, state.pending.len())
    }
}
