//! A Tokio-based bounded task pool.
//!
//! At most `capacity` submitted futures run at the same time. A submission
//! either spawns a new worker, is handed directly to an idle worker, or (when
//! the pool is saturated) waits for a worker to become idle. In non-blocking
//! mode a saturated pool rejects the submission with [`PoolError::PoolOverload`]
//! instead.

mod completion;
mod config;
mod error;
mod handoff;
mod pool;
mod task;
mod worker;

pub use config::PoolOptions;
pub use error::PoolError;
pub use pool::TaskPool;
pub use task::TaskToExecute;
