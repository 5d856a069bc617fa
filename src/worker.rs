use crate::handoff::Handoff;
use crate::task::Job;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle as TokioHandle;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, error, info_span, trace, Instrument};

lazy_static::lazy_static! {
  static ref NEXT_WORKER_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// A long-lived execution unit. It runs its seed job, then keeps taking jobs
/// from the handoff until the handoff is closed.
///
/// The worker owns one capacity permit for its whole life; the permit goes back
/// to the pool when the worker exits.
pub(crate) struct Worker {
  worker_id: u64,
  pool_name: Arc<String>,
  handoff: Arc<Handoff>,
  _slot: OwnedSemaphorePermit,
}

impl Worker {
  pub(crate) fn new(pool_name: Arc<String>, handoff: Arc<Handoff>, slot: OwnedSemaphorePermit) -> Self {
    Self {
      worker_id: NEXT_WORKER_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed),
      pool_name,
      handoff,
      _slot: slot,
    }
  }

  pub(crate) fn id(&self) -> u64 {
    self.worker_id
  }

  /// Starts the worker on `tokio_handle`, seeded with `seed`.
  pub(crate) fn spawn(self, seed: Job, tokio_handle: &TokioHandle) {
    let span = info_span!("pool_worker", pool_name = %*self.pool_name, worker_id = self.worker_id);
    // Detached: completion is observed through the pool's outstanding count.
    drop(tokio_handle.spawn(self.run(seed).instrument(span)));
  }

  async fn run(self, seed: Job) {
    debug!("Worker started.");

    let mut next = Some(seed);
    while let Some(job) = next {
      self.execute(job).await;
      trace!("Worker idle, waiting on handoff.");
      next = self.handoff.recv().await;
    }

    debug!("Handoff closed. Worker exiting and releasing its slot.");
  }

  async fn execute(&self, job: Job) {
    let Job {
      task_id,
      future,
      completion,
    } = job;

    trace!(%task_id, "Executing task.");
    match AssertUnwindSafe(future).catch_unwind().await {
      Ok(()) => trace!(%task_id, "Task executed successfully."),
      Err(panic_payload) => {
        error!(
          %task_id,
          panic = %panic_message(panic_payload.as_ref()),
          "Task panicked during execution."
        );
      }
    }

    // Completion is reported only after the task, or its panic handling, is finished.
    drop(completion);
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
  if let Some(message) = payload.downcast_ref::<&'static str>() {
    message
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.as_str()
  } else {
    "<non-string panic payload>"
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_panic_message_renders_string_payloads() {
    let static_payload: Box<dyn Any + Send> = Box::new("static message");
    assert_eq!(panic_message(static_payload.as_ref()), "static message");

    let owned_payload: Box<dyn Any + Send> = Box::new(format!("task {} failed", 7));
    assert_eq!(panic_message(owned_payload.as_ref()), "task 7 failed");

    let other_payload: Box<dyn Any + Send> = Box::new(42u32);
    assert_eq!(panic_message(other_payload.as_ref()), "<non-string panic payload>");
  }
}
