use thiserror::Error;

/// Errors that can occur within the `bounded_pool` pool.
#[derive(Error, Debug, PartialEq)]
pub enum PoolError {
  #[error("Pool capacity must be between 1 and the semaphore limit, got {0}")]
  InvalidCapacity(usize),

  #[error("Pool is saturated and no idle worker is ready to accept the task")]
  PoolOverload,

  #[error("Pool has been released and does not accept new tasks")]
  PoolReleased,

  #[error("Timed out waiting for outstanding tasks to complete")]
  WaitTimeout,
}
