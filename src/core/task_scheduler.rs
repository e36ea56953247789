//! 任务调度：限制同时进行的运行数
//!
//! 批量模式下每个运行先取得许可再开始；许可随运行结束释放。

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::core::AgentError;

/// 运行调度器（Semaphore 限流）
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    run_semaphore: Arc<Semaphore>,
    max_concurrent_runs: usize,
}

impl TaskScheduler {
    pub fn new(max_concurrent_runs: usize) -> Self {
        let max = max_concurrent_runs.max(1);
        Self {
            run_semaphore: Arc::new(Semaphore::new(max)),
            max_concurrent_runs: max,
        }
    }

    /// 获取运行许可；调度器关闭后返回 Cancelled
    pub async fn acquire_run(&self) -> Result<OwnedSemaphorePermit, AgentError> {
        self.run_semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AgentError::Cancelled)
    }

    /// 停止发放新许可，等待中的运行收到 Cancelled
    pub fn close(&self) {
        self.run_semaphore.close();
    }

    pub fn available(&self) -> usize {
        self.run_semaphore.available_permits()
    }

    pub fn max_concurrent_runs(&self) -> usize {
        self.max_concurrent_runs
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(3)
    }
}
