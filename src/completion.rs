use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Counts tasks that have been accepted but not yet completed.
///
/// Each accepted task holds a [`CompletionGuard`]; dropping the guard reports
/// completion. When the count falls to zero every `wait()`er is woken.
#[derive(Default)]
pub(crate) struct CompletionTracker {
  outstanding: AtomicUsize,
  all_done: Notify,
}

impl fmt::Debug for CompletionTracker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CompletionTracker")
      .field("outstanding", &self.outstanding())
      .finish_non_exhaustive()
  }
}

impl CompletionTracker {
  pub(crate) fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Registers one outstanding task. The count is raised before this returns,
  /// so it is visible before the task can be handed to a worker.
  pub(crate) fn track(self: &Arc<Self>) -> CompletionGuard {
    self.outstanding.fetch_add(1, Ordering::SeqCst);
    CompletionGuard { tracker: self.clone() }
  }

  pub(crate) fn outstanding(&self) -> usize {
    self.outstanding.load(Ordering::SeqCst)
  }

  /// Resolves once no task is outstanding. Tasks tracked after the call
  /// started are waited for too.
  pub(crate) async fn wait(&self) {
    loop {
      let notified = self.all_done.notified();
      tokio::pin!(notified);
      // Register interest before reading the counter so a concurrent final
      // `done` cannot slip between the check and the await.
      notified.as_mut().enable();

      if self.outstanding() == 0 {
        return;
      }
      notified.await;
    }
  }

  fn done(&self) {
    if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
      self.all_done.notify_waiters();
    }
  }
}

/// Reports completion of one tracked task when dropped.
pub(crate) struct CompletionGuard {
  tracker: Arc<CompletionTracker>,
}

impl Drop for CompletionGuard {
  fn drop(&mut self) {
    self.tracker.done();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn test_wait_returns_immediately_when_nothing_outstanding() {
    let tracker = CompletionTracker::new();
    tokio::time::timeout(Duration::from_millis(50), tracker.wait())
      .await
      .expect("wait() should not block with zero outstanding tasks");
  }

  #[tokio::test]
  async fn test_wait_blocks_until_last_guard_dropped() {
    let tracker = CompletionTracker::new();
    let first = tracker.track();
    let second = tracker.track();
    assert_eq!(tracker.outstanding(), 2);

    let waiter = {
      let tracker = tracker.clone();
      tokio::spawn(async move { tracker.wait().await })
    };

    drop(first);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished(), "One task is still outstanding.");

    drop(second);
    tokio::time::timeout(Duration::from_millis(200), waiter)
      .await
      .expect("wait() did not resolve after the last guard was dropped")
      .unwrap();
    assert_eq!(tracker.outstanding(), 0);
  }

  #[tokio::test]
  async fn test_wait_covers_tasks_tracked_after_wait_started() {
    let tracker = CompletionTracker::new();
    let first = tracker.track();

    let waiter = {
      let tracker = tracker.clone();
      tokio::spawn(async move { tracker.wait().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let late = tracker.track();
    drop(first);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished(), "Late task is still outstanding.");

    drop(late);
    tokio::time::timeout(Duration::from_millis(200), waiter)
      .await
      .expect("wait() did not resolve after the late guard was dropped")
      .unwrap();
  }
}
