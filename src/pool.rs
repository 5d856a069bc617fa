use crate::completion::CompletionTracker;
use crate::config::PoolOptions;
use crate::error::PoolError;
use crate::handoff::{Handoff, TrySendError};
use crate::task::{PendingTask, TaskToExecute};
use crate::worker::Worker;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle as TokioHandle;
use tokio::sync::{Semaphore, TryAcquireError};
use tracing::{debug, info, trace, warn};

/// A pool that runs at most `capacity` submitted futures at once.
///
/// Workers are spawned lazily, one per free capacity slot, and stay alive
/// until the pool is released. A submission that finds every slot taken is
/// handed directly to an idle worker; if none is idle it either waits for one
/// or, in non-blocking mode, is rejected with [`PoolError::PoolOverload`].
#[derive(Debug)]
pub struct TaskPool {
  pool_name: Arc<String>,
  capacity: usize,
  non_blocking: bool,
  slots: Arc<Semaphore>,
  handoff: Arc<Handoff>,
  completion: Arc<CompletionTracker>,
  tokio_handle: TokioHandle,
}

impl TaskPool {
  /// Creates a pool whose workers run on `tokio_handle`.
  ///
  /// # Errors
  /// Returns `PoolError::InvalidCapacity` if `capacity` is zero or exceeds
  /// what a Tokio semaphore can hold.
  pub fn new(capacity: usize, options: PoolOptions, tokio_handle: TokioHandle) -> Result<Arc<Self>, PoolError> {
    if capacity == 0 || capacity > Semaphore::MAX_PERMITS {
      return Err(PoolError::InvalidCapacity(capacity));
    }

    info!(
      pool_name = %options.name,
      capacity,
      non_blocking = options.non_blocking,
      "Creating task pool."
    );

    let completion = CompletionTracker::new();
    Ok(Arc::new(Self {
      pool_name: Arc::new(options.name),
      capacity,
      non_blocking: options.non_blocking,
      slots: Arc::new(Semaphore::new(capacity)),
      handoff: Arc::new(Handoff::new(completion.clone())),
      completion,
      tokio_handle,
    }))
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn is_non_blocking(&self) -> bool {
    self.non_blocking
  }

  /// Number of workers currently alive, busy or idle.
  pub fn live_workers(&self) -> usize {
    self.capacity - self.slots.available_permits()
  }

  /// Number of workers parked waiting for their next task.
  pub fn idle_workers(&self) -> usize {
    self.handoff.idle_count()
  }

  /// Number of accepted tasks that have not completed yet. A submission counts
  /// only once it has been given a new worker or handed to an idle one; tasks
  /// that are rejected, or still waiting inside `submit`, do not.
  pub fn outstanding_tasks(&self) -> usize {
    self.completion.outstanding()
  }

  pub fn is_released(&self) -> bool {
    self.handoff.is_closed()
  }

  /// Submits a task to the pool.
  ///
  /// Admission tries, in order: spawning a new worker if a capacity slot is
  /// free, handing the task to a worker that is idle right now, and finally
  /// waiting for a worker to become idle. In non-blocking mode the last step
  /// is replaced by an immediate rejection.
  ///
  /// # Errors
  /// Returns `PoolError::PoolOverload` in non-blocking mode when the pool is
  /// saturated; the task is dropped without running.
  /// Returns `PoolError::PoolReleased` if the pool has been released.
  pub async fn submit<F>(&self, task: F) -> Result<(), PoolError>
  where
    F: Future<Output = ()> + Send + 'static,
  {
    self.submit_boxed(Box::pin(task)).await
  }

  /// Submits a zero-argument callable; it is invoked on the worker and the
  /// future it returns is awaited there.
  pub async fn submit_fn<F, Fut>(&self, task_fn: F) -> Result<(), PoolError>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.submit(async move { task_fn().await }).await
  }

  /// Like [`TaskPool::submit`], but discards the admission outcome.
  pub async fn schedule<F>(&self, task: F)
  where
    F: Future<Output = ()> + Send + 'static,
  {
    if let Err(e) = self.submit(task).await {
      debug!(pool_name = %*self.pool_name, "Schedule: submission not accepted: {}", e);
    }
  }

  /// Submits an already boxed task. Same admission rules as [`TaskPool::submit`].
  pub async fn submit_boxed(&self, future: TaskToExecute) -> Result<(), PoolError> {
    if self.handoff.is_closed() {
      warn!(pool_name = %*self.pool_name, "Submit: Attempted to submit task to a released pool.");
      return Err(PoolError::PoolReleased);
    }

    let task = PendingTask::new(future);
    let task_id = task.task_id;

    match self.slots.clone().try_acquire_owned() {
      Ok(slot) => {
        let worker = Worker::new(self.pool_name.clone(), self.handoff.clone(), slot);
        debug!(
          pool_name = %*self.pool_name,
          %task_id,
          worker_id = worker.id(),
          live_workers = self.live_workers(),
          "Submit: Free slot, spawning worker."
        );
        worker.spawn(task.commit(self.completion.track()), &self.tokio_handle);
        return Ok(());
      }
      Err(TryAcquireError::Closed) => {
        warn!(pool_name = %*self.pool_name, %task_id, "Submit: Pool released during admission.");
        return Err(PoolError::PoolReleased);
      }
      Err(TryAcquireError::NoPermits) => {}
    }

    let task = match self.handoff.try_send(task) {
      Ok(()) => {
        trace!(pool_name = %*self.pool_name, %task_id, "Submit: Handed task to an idle worker.");
        return Ok(());
      }
      Err(TrySendError::Closed(_)) => return Err(PoolError::PoolReleased),
      Err(TrySendError::NoReceiver(task)) => task,
    };

    if self.non_blocking {
      debug!(pool_name = %*self.pool_name, %task_id, "Submit: Pool saturated, rejecting task.");
      return Err(PoolError::PoolOverload);
    }

    trace!(pool_name = %*self.pool_name, %task_id, "Submit: Pool saturated, waiting for an idle worker.");
    match self.handoff.send(task).await {
      Ok(()) => {
        trace!(pool_name = %*self.pool_name, %task_id, "Submit: Handed task to a worker after waiting.");
        Ok(())
      }
      Err(_) => {
        warn!(pool_name = %*self.pool_name, %task_id, "Submit: Pool released while waiting for an idle worker.");
        Err(PoolError::PoolReleased)
      }
    }
  }

  /// Stops accepting tasks and lets workers exit once they become idle.
  ///
  /// Running tasks, and tasks already handed to a worker, still complete.
  /// Calling this more than once has no further effect.
  pub fn release(&self) {
    // Slots first, so no worker can be spawned once the handoff is closed.
    self.slots.close();
    if self.handoff.close() {
      info!(
        pool_name = %*self.pool_name,
        live_workers = self.live_workers(),
        outstanding = self.outstanding_tasks(),
        "Pool released. Idle workers will exit."
      );
    } else {
      warn!(pool_name = %*self.pool_name, "Release: Pool was already released.");
    }
  }

  /// Waits until every accepted task has completed, including tasks accepted
  /// while this call is waiting. Submissions still blocked in `submit` are not
  /// waited for until they are accepted.
  pub async fn wait(&self) {
    self.completion.wait().await;
    trace!(pool_name = %*self.pool_name, "Wait: No outstanding tasks.");
  }

  /// Like [`TaskPool::wait`], bounded by `timeout`.
  ///
  /// # Errors
  /// Returns `PoolError::WaitTimeout` if tasks are still outstanding when the
  /// timeout elapses. The tasks keep running.
  pub async fn wait_timeout(&self, timeout: Duration) -> Result<(), PoolError> {
    tokio::time::timeout(timeout, self.wait()).await.map_err(|_| {
      debug!(
        pool_name = %*self.pool_name,
        outstanding = self.outstanding_tasks(),
        "Wait: Timed out."
      );
      PoolError::WaitTimeout
    })
  }
}

impl Drop for TaskPool {
  fn drop(&mut self) {
    if !self.handoff.is_closed() {
      info!(
        pool_name = %*self.pool_name,
        "TaskPool dropped without release. Releasing implicitly."
      );
      self.slots.close();
      self.handoff.close();
    } else {
      trace!(pool_name = %*self.pool_name, "Drop: Pool already released.");
    }
  }
}
