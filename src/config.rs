/// Options fixed at pool construction.
#[derive(Clone, Debug)]
pub struct PoolOptions {
  /// When `true`, `submit` on a saturated pool returns `PoolError::PoolOverload`
  /// instead of waiting for a worker to become idle.
  pub non_blocking: bool,

  /// Name used in log records emitted by the pool and its workers.
  pub name: String,
}

impl Default for PoolOptions {
  fn default() -> Self {
    Self {
      non_blocking: false,
      name: "task_pool".to_string(),
    }
  }
}

impl PoolOptions {
  /// Sets whether a saturated pool rejects submissions instead of waiting.
  pub fn with_non_blocking(mut self, non_blocking: bool) -> Self {
    self.non_blocking = non_blocking;
    self
  }

  /// Sets the pool name used in log records.
  pub fn with_name(mut self, name: &str) -> Self {
    self.name = name.to_string();
    self
  }
}
