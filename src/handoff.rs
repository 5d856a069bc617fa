use crate::completion::CompletionTracker;
use crate::task::{Job, PendingTask};

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};

/// Why a non-blocking handoff did not deliver the task. The task is handed
/// back uncounted in both cases.
#[derive(Debug)]
pub(crate) enum TrySendError {
  /// No worker is parked waiting for a job right now.
  NoReceiver(PendingTask),
  /// The handoff has been closed by `release`.
  Closed(PendingTask),
}

struct HandoffState {
  parked: VecDeque<oneshot::Sender<Job>>,
  closed: bool,
}

/// An unbuffered rendezvous between submitters and idle workers.
///
/// A send only succeeds when a worker is parked in `recv` at that moment; the
/// task then moves straight into that worker. Nothing is ever queued inside the
/// handoff itself.
///
/// A task is counted as outstanding only once a parked worker has been claimed
/// for it, and before the worker can receive it.
pub(crate) struct Handoff {
  state: Mutex<HandoffState>,
  worker_parked: Notify,
  completion: Arc<CompletionTracker>,
}

impl fmt::Debug for Handoff {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.lock();
    f.debug_struct("Handoff")
      .field("parked", &state.parked.len())
      .field("closed", &state.closed)
      .finish()
  }
}

impl Handoff {
  pub(crate) fn new(completion: Arc<CompletionTracker>) -> Self {
    Self {
      state: Mutex::new(HandoffState {
        parked: VecDeque::new(),
        closed: false,
      }),
      worker_parked: Notify::new(),
      completion,
    }
  }

  /// Delivers `task` to a parked worker if one is ready at this instant.
  pub(crate) fn try_send(&self, mut task: PendingTask) -> Result<(), TrySendError> {
    loop {
      let (slot, more_parked) = {
        let mut state = self.state.lock();
        if state.closed {
          return Err(TrySendError::Closed(task));
        }
        let slot = state.parked.pop_front();
        (slot, !state.parked.is_empty())
      };

      let Some(slot) = slot else {
        return Err(TrySendError::NoReceiver(task));
      };

      match slot.send(task.commit(self.completion.track())) {
        Ok(()) => {
          if more_parked {
            // Pass the wakeup on so a blocked sender sees the remaining workers.
            self.worker_parked.notify_one();
          }
          return Ok(());
        }
        // The parked receiver went away without taking a job; try the next one.
        Err(returned) => task = returned.revert(),
      }
    }
  }

  /// Waits until a worker parks and delivers `task` to it. Returns the task if
  /// the handoff is closed first.
  pub(crate) async fn send(&self, mut task: PendingTask) -> Result<(), PendingTask> {
    loop {
      let notified = self.worker_parked.notified();
      tokio::pin!(notified);
      notified.as_mut().enable();

      match self.try_send(task) {
        Ok(()) => return Ok(()),
        Err(TrySendError::Closed(returned)) => return Err(returned),
        Err(TrySendError::NoReceiver(returned)) => task = returned,
      }
      notified.await;
    }
  }

  /// Parks the calling worker until a job arrives. `None` means the handoff
  /// was closed and no job was delivered.
  pub(crate) async fn recv(&self) -> Option<Job> {
    let (slot, rx) = oneshot::channel();
    {
      let mut state = self.state.lock();
      if state.closed {
        return None;
      }
      state.parked.push_back(slot);
    }
    self.worker_parked.notify_one();
    rx.await.ok()
  }

  /// Closes the handoff. Parked workers observe `None`, blocked senders get
  /// their task back. Returns `false` if it was already closed.
  pub(crate) fn close(&self) -> bool {
    let parked = {
      let mut state = self.state.lock();
      if state.closed {
        return false;
      }
      state.closed = true;
      std::mem::take(&mut state.parked)
    };
    drop(parked);
    self.worker_parked.notify_waiters();
    true
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.state.lock().closed
  }

  /// Number of workers currently parked waiting for a job.
  pub(crate) fn idle_count(&self) -> usize {
    self.state.lock().parked.iter().filter(|slot| !slot.is_closed()).count()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  fn new_handoff() -> (Arc<Handoff>, Arc<CompletionTracker>) {
    let tracker = CompletionTracker::new();
    (Arc::new(Handoff::new(tracker.clone())), tracker)
  }

  fn dummy_task() -> PendingTask {
    PendingTask::new(Box::pin(async {}))
  }

  async fn wait_for_parked(handoff: &Handoff, count: usize) {
    tokio::time::timeout(Duration::from_millis(500), async {
      while handoff.idle_count() < count {
        tokio::time::sleep(Duration::from_millis(5)).await;
      }
    })
    .await
    .expect("Receivers did not park in time.");
  }

  #[tokio::test]
  async fn test_try_send_without_receiver_returns_task_uncounted() {
    let (handoff, tracker) = new_handoff();

    match handoff.try_send(dummy_task()) {
      Err(TrySendError::NoReceiver(task)) => drop(task),
      other => panic!("Expected NoReceiver, got {:?}", other),
    }
    assert_eq!(tracker.outstanding(), 0, "A task nobody received must not be counted.");
  }

  #[tokio::test]
  async fn test_try_send_reaches_parked_receiver_and_counts_task() {
    let (handoff, tracker) = new_handoff();

    let (job_tx, job_rx) = tokio::sync::oneshot::channel();
    {
      let handoff = handoff.clone();
      tokio::spawn(async move {
        let _ = job_tx.send(handoff.recv().await);
      });
    }
    wait_for_parked(&handoff, 1).await;

    let task = dummy_task();
    let sent_id = task.task_id;
    handoff.try_send(task).unwrap();

    let job = job_rx.await.unwrap().expect("Receiver should get the job.");
    assert_eq!(job.task_id, sent_id);
    assert_eq!(tracker.outstanding(), 1, "Delivered job counts until it is dropped.");
    drop(job);
    assert_eq!(tracker.outstanding(), 0);
    assert_eq!(handoff.idle_count(), 0);
  }

  #[tokio::test]
  async fn test_send_blocks_until_receiver_parks() {
    let (handoff, tracker) = new_handoff();

    let send_future = handoff.send(dummy_task());
    tokio::pin!(send_future);

    tokio::select! {
        _ = &mut send_future => {
            panic!("Send should have blocked because no receiver is parked.");
        },
        _ = tokio::time::sleep(Duration::from_millis(50)) => {}
    }
    assert_eq!(tracker.outstanding(), 0, "A blocked send must not be counted yet.");

    let receiver = {
      let handoff = handoff.clone();
      tokio::spawn(async move { handoff.recv().await.is_some() })
    };

    tokio::time::timeout(Duration::from_millis(200), send_future)
      .await
      .expect("Send did not complete after a receiver parked.")
      .unwrap();
    assert!(receiver.await.unwrap());
  }

  #[tokio::test]
  async fn test_close_wakes_parked_receivers() {
    let (handoff, _tracker) = new_handoff();

    let receivers: Vec<_> = (0..3)
      .map(|_| {
        let handoff = handoff.clone();
        tokio::spawn(async move { handoff.recv().await.is_none() })
      })
      .collect();
    wait_for_parked(&handoff, 3).await;

    assert!(handoff.close());
    assert!(!handoff.close(), "Second close should report already closed.");

    for receiver in receivers {
      assert!(receiver.await.unwrap(), "Parked receiver should observe closure.");
    }
    assert!(handoff.recv().await.is_none(), "Recv after close must not park.");
  }

  #[tokio::test]
  async fn test_close_fails_blocked_sender() {
    let (handoff, tracker) = new_handoff();

    let sender = {
      let handoff = handoff.clone();
      tokio::spawn(async move { handoff.send(dummy_task()).await.is_err() })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    handoff.close();
    assert!(sender.await.unwrap(), "Blocked send should fail once closed.");
    assert_eq!(tracker.outstanding(), 0);
  }
}
