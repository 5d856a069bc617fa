use bounded_pool::{PoolOptions, TaskPool};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{error, info};

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();

  info!("--- Basic Usage Example (capacity 3, 10 tasks of 2s) ---");

  let pool = TaskPool::new(3, PoolOptions::default().with_name("basic_pool"), Handle::current())
    .expect("Failed to create pool");

  let started = Instant::now();
  for index in 0..10 {
    let submitted = pool
      .submit(async move {
        info!("do {}", index);
        tokio::time::sleep(Duration::from_secs(2)).await;
      })
      .await;
    if let Err(e) = submitted {
      error!("Failed to submit task {}: {}", index, e);
    }
  }

  pool.wait().await;
  info!("all done in {:?} (expected ~8s: 4 batches of 3)", started.elapsed());
  pool.release();
}
