use crate::completion::CompletionGuard;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

lazy_static::lazy_static! {
  static ref NEXT_POOL_TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// The type of future that the pool executes.
/// It must be `Send` and `'static`, and produce no result.
pub type TaskToExecute = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A submitted task whose admission has not been decided yet. It is not
/// counted as outstanding.
pub(crate) struct PendingTask {
  pub(crate) task_id: u64,
  pub(crate) future: TaskToExecute,
}

impl PendingTask {
  pub(crate) fn new(future: TaskToExecute) -> Self {
    Self {
      task_id: NEXT_POOL_TASK_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed),
      future,
    }
  }

  /// Marks the task as accepted. The guard must be taken before the job can
  /// reach a worker.
  pub(crate) fn commit(self, completion: CompletionGuard) -> Job {
    Job {
      task_id: self.task_id,
      future: self.future,
      completion,
    }
  }
}

impl fmt::Debug for PendingTask {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PendingTask").field("task_id", &self.task_id).finish_non_exhaustive()
  }
}

/// An accepted task on its way to, or inside, a worker.
///
/// The completion guard travels with the task, so the outstanding count drops
/// exactly when the job is dropped after execution.
pub(crate) struct Job {
  pub(crate) task_id: u64,
  pub(crate) future: TaskToExecute,
  pub(crate) completion: CompletionGuard,
}

impl Job {
  /// Withdraws an accepted job whose delivery failed, releasing its count.
  pub(crate) fn revert(self) -> PendingTask {
    PendingTask {
      task_id: self.task_id,
      future: self.future,
    }
  }
}

impl fmt::Debug for Job {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Job").field("task_id", &self.task_id).finish_non_exhaustive()
  }
}
