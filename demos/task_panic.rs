use bounded_pool::{PoolOptions, TaskPool};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Task Panic Example ---");

  let pool = TaskPool::new(1, PoolOptions::default().with_name("panic_pool"), Handle::current())
    .expect("Failed to create pool");

  pool
    .submit(async {
      info!("Panicking Task: Starting...");
      tokio::time::sleep(Duration::from_millis(100)).await;
      info!("Panicking Task: About to panic!");
      panic!("This task is designed to panic!");
    })
    .await
    .expect("Failed to submit panicking task");

  pool
    .submit(async {
      info!("Follow-up Task: runs on the same worker after the panic.");
    })
    .await
    .expect("Failed to submit follow-up task");

  pool.wait().await;
  info!("All tasks accounted for; live workers: {}", pool.live_workers());

  pool.release();
  info!("--- Task Panic Example End ---");
}
