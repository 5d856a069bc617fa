use bounded_pool::{PoolError, PoolOptions, TaskPool};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Non-blocking Overload Example (capacity 2) ---");

  let options = PoolOptions::default()
    .with_name("overload_pool")
    .with_non_blocking(true);
  let pool = TaskPool::new(2, options, Handle::current()).expect("Failed to create pool");

  let mut accepted = 0;
  let mut rejected = 0;
  for index in 0..5 {
    match pool
      .submit(async move {
        info!("Task {} running", index);
        tokio::time::sleep(Duration::from_millis(500)).await;
        info!("Task {} finished", index);
      })
      .await
    {
      Ok(()) => accepted += 1,
      Err(PoolError::PoolOverload) => {
        warn!("Task {} rejected: pool is saturated", index);
        rejected += 1;
      }
      Err(e) => warn!("Task {} failed to submit: {}", index, e),
    }
  }

  pool.wait().await;
  info!("Accepted {} tasks, rejected {}.", accepted, rejected);
  pool.release();
  info!("--- Non-blocking Overload Example End ---");
}
