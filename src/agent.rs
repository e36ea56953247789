//! 批量运行时
//!
//! 从 JSON 读取题目列表，在 TaskScheduler 限流下并发运行，每个运行使用 SessionSupervisor 的子 token；
//! 结果按输入顺序汇总为 AnswerRecord（提交答案 + 终止原因 + 计数 + 起止时间）。
//! 根 token 取消时关闭调度器，尚未开始的任务直接记为取消。

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;

use crate::core::{Orchestrator, SessionSupervisor, Task, TaskScheduler, TerminationReason};

/// 单题结果；取消或致命错误时 submitted_answer 为空并写入 error
#[derive(Debug, Clone, Serialize)]
pub struct AnswerRecord {
    pub task_id: String,
    pub submitted_answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<TerminationReason>,
    pub iterations: usize,
    pub tool_calls: usize,
    pub started_at: String,
    pub finished_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 读取题目文件：JSON 数组，元素为 {task_id, question, file_name?}
pub fn load_tasks(path: &Path) -> anyhow::Result<Vec<Task>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read tasks from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid tasks JSON in {}", path.display()))
}

/// 批量运行器：共享同一个编排器，每个任务拥有独立会话
pub struct BatchRunner {
    orchestrator: Arc<Orchestrator>,
    scheduler: TaskScheduler,
    supervisor: Arc<SessionSupervisor>,
}

impl BatchRunner {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        scheduler: TaskScheduler,
        supervisor: Arc<SessionSupervisor>,
    ) -> Self {
        Self {
            orchestrator,
            scheduler,
            supervisor,
        }
    }

    async fn run_one(&self, task: Task) -> AnswerRecord {
        let task_id = task.task_id.clone();
        let started_at = Utc::now().to_rfc3339();
        let record = |answer: String,
                      reason: Option<TerminationReason>,
                      iterations: usize,
                      tool_calls: usize,
                      error: Option<String>| AnswerRecord {
            task_id: task_id.clone(),
            submitted_answer: answer,
            reason,
            iterations,
            tool_calls,
            started_at: started_at.clone(),
            finished_at: Utc::now().to_rfc3339(),
            error,
        };

        let _permit = match self.scheduler.acquire_run().await {
            Ok(permit) => permit,
            Err(e) => return record(String::new(), None, 0, 0, Some(e.to_string())),
        };
        match self
            .orchestrator
            .run_task(task, self.supervisor.child_token())
            .await
        {
            Ok(outcome) => record(
                outcome.answer.formatted_text,
                Some(outcome.reason),
                outcome.iteration_count,
                outcome.tool_call_count,
                None,
            ),
            Err(e) => {
                tracing::warn!(task_id = %task_id, error = %e, "run did not produce an answer");
                record(String::new(), None, 0, 0, Some(e.to_string()))
            }
        }
    }

    /// 并发运行所有任务（并发度由 TaskScheduler 限制），结果与输入顺序一致
    pub async fn run_batch(&self, tasks: Vec<Task>) -> Vec<AnswerRecord> {
        tracing::info!(
            tasks = tasks.len(),
            max_concurrent = self.scheduler.max_concurrent_runs(),
            "batch started"
        );
        let batch = join_all(tasks.into_iter().map(|task| self.run_one(task)));
        tokio::pin!(batch);
        let shutdown = self.supervisor.cancel_token();
        let records = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                // 排队的任务不再取得许可；进行中的运行由子 token 在步边界终止
                tracing::warn!(
                    available = self.scheduler.available(),
                    "batch cancelled, closing scheduler"
                );
                self.scheduler.close();
                batch.await
            }
            records = &mut batch => records,
        };
        let answered = records.iter().filter(|r| r.error.is_none()).count();
        let (prompt_tokens, completion_tokens, total_tokens) = self.orchestrator.token_usage();
        tracing::info!(
            answered,
            total = records.len(),
            prompt_tokens,
            completion_tokens,
            total_tokens,
            "batch finished"
        );
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::react::{AnswerFormatter, ReasoningStep};
    use crate::tools::{ToolExecutor, ToolRegistry};

    fn runner(supervisor: Arc<SessionSupervisor>) -> BatchRunner {
        let executor = ToolExecutor::new(ToolRegistry::new(), 5);
        let reasoning = ReasoningStep::new(Arc::new(MockLlmClient::new()), "sys", vec![]);
        let orchestrator = Orchestrator::new(reasoning, executor, AnswerFormatter::default())
            .with_skip_task_ids(vec!["skip".to_string()]);
        BatchRunner::new(Arc::new(orchestrator), TaskScheduler::new(2), supervisor)
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let runner = runner(Arc::new(SessionSupervisor::new()));
        let tasks = vec![
            Task::new("a", "Paris", None),
            Task::new("skip", "ignored", None),
            Task::new("c", "42", None),
        ];
        let records = runner.run_batch(tasks).await;
        let answers: Vec<&str> = records.iter().map(|r| r.submitted_answer.as_str()).collect();
        assert_eq!(answers, vec!["Paris", "Skipped", "42"]);
        assert_eq!(records[1].reason, Some(TerminationReason::Skipped));
        assert!(records.iter().all(|r| r.error.is_none()));
    }

    #[tokio::test]
    async fn test_cancelled_batch_reports_errors() {
        let supervisor = Arc::new(SessionSupervisor::new());
        supervisor.cancel();
        let records = runner(supervisor)
            .run_batch(vec![Task::new("a", "q", None)])
            .await;
        assert_eq!(records[0].submitted_answer, "");
        assert_eq!(records[0].error.as_deref(), Some("Run cancelled"));
    }

    #[tokio::test]
    async fn test_cancel_closes_scheduler() {
        let supervisor = Arc::new(SessionSupervisor::new());
        let runner = runner(supervisor.clone());
        supervisor.cancel();
        let records = runner
            .run_batch(vec![Task::new("a", "q", None), Task::new("b", "q", None)])
            .await;
        assert!(records.iter().all(|r| r.error.as_deref() == Some("Run cancelled")));
        assert!(runner.scheduler.acquire_run().await.is_err());
    }

    #[tokio::test]
    async fn test_uncancelled_batch_keeps_scheduler_open() {
        let runner = runner(Arc::new(SessionSupervisor::new()));
        runner.run_batch(vec![Task::new("a", "Paris", None)]).await;
        assert_eq!(runner.scheduler.available(), 2);
        assert!(runner.scheduler.acquire_run().await.is_ok());
    }

    #[test]
    fn test_load_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(
            &path,
            r#"[{"task_id": "1", "question": "q1", "file_name": ""}, {"task_id": "2", "question": "q2", "file_name": "a.py"}]"#,
        )
        .unwrap();
        let tasks = load_tasks(&path).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].file_name, None);
        assert_eq!(tasks[1].file_name.as_deref(), Some("a.py"));
    }
}
