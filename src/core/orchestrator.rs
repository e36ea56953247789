//! 编排器：显式状态机驱动一次运行
//!
//! Running → 推理步 → ToolCall 进入 AwaitingTool / Terminal 进入 Terminated(normal)；
//! AwaitingTool → 工具步（成功或失败都写回会话）→ Running。
//! iteration_count 在 Running 与 AwaitingTool 入口检查，tool_call_count 在 AwaitingTool 入口检查，
//! 达到上限即强制终止并给出尽力答案或兜底文本。取消只在步边界生效（包括推理到格式化之间）。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::{
    AgentError, RecoveryAction, RecoveryEngine, RunLimits, RunState, SessionState, Task,
    TerminationReason,
};
use crate::memory::Message;
use crate::react::events::preview;
use crate::react::{
    AnswerExtractor, AnswerFormatter, FinalAnswer, ReasoningStep, RoutingDecision, RunEvent,
    ToolCall,
};
use crate::tools::{NoFileFetcher, TaskFileFetcher, ToolExecutor};

/// 工具结果预览最大字符数
const RESULT_PREVIEW_CHARS: usize = 200;

/// 跳过列表中的任务返回的答案
pub const SKIPPED_ANSWER: &str = "Skipped";

/// 一次运行的结果
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub task_id: String,
    pub answer: FinalAnswer,
    pub reason: TerminationReason,
    pub iteration_count: usize,
    pub tool_call_count: usize,
    #[serde(skip)]
    pub messages: Vec<Message>,
}

fn emit(events: Option<&UnboundedSender<RunEvent>>, event: RunEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

fn cancel_requested(cancel: &CancellationToken, deadline: Option<Instant>) -> bool {
    cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d)
}

/// 记录取消并返回 Cancelled；调用方随后丢弃 session（含附件）
fn abort_cancelled(session: &SessionState, events: Option<&UnboundedSender<RunEvent>>) -> AgentError {
    tracing::info!(
        run_id = %session.run_id(),
        iterations = session.iteration_count(),
        tool_calls = session.tool_call_count(),
        "run cancelled"
    );
    emit(events, RunEvent::Recovery {
        action: "Abort".to_string(),
        detail: AgentError::Cancelled.to_string(),
    });
    AgentError::Cancelled
}

/// 编排器：构造后不可变，可在并发运行间共享（每次运行拥有自己的 SessionState）
pub struct Orchestrator {
    reasoning: ReasoningStep,
    executor: ToolExecutor,
    formatter: AnswerFormatter,
    extractor: Option<AnswerExtractor>,
    recovery: RecoveryEngine,
    files: Arc<dyn TaskFileFetcher>,
    limits: RunLimits,
    skip_task_ids: HashSet<String>,
    run_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(reasoning: ReasoningStep, executor: ToolExecutor, formatter: AnswerFormatter) -> Self {
        Self {
            reasoning,
            executor,
            formatter,
            extractor: None,
            recovery: RecoveryEngine::new(),
            files: Arc::new(NoFileFetcher),
            limits: RunLimits::default(),
            skip_task_ids: HashSet::new(),
            run_timeout: None,
        }
    }

    pub fn with_limits(mut self, limits: RunLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_extractor(mut self, extractor: AnswerExtractor) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_file_fetcher(mut self, files: Arc<dyn TaskFileFetcher>) -> Self {
        self.files = files;
        self
    }

    pub fn with_skip_task_ids<I: IntoIterator<Item = String>>(mut self, ids: I) -> Self {
        self.skip_task_ids = ids.into_iter().collect();
        self
    }

    /// 单次运行的截止时间；到期后在下一个步边界取消
    pub fn with_run_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn limits(&self) -> RunLimits {
        self.limits
    }

    /// 推理 LLM 的累计 token 使用：(prompt, completion, total)
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.reasoning.token_usage()
    }

    /// 对外接口：run(question, task_id, file_name) -> formatted_text
    pub async fn run(
        &self,
        question: &str,
        task_id: &str,
        file_name: Option<&str>,
    ) -> Result<String, AgentError> {
        let outcome = self
            .run_task(Task::new(task_id, question, file_name), CancellationToken::new())
            .await?;
        Ok(outcome.answer.formatted_text)
    }

    pub async fn run_task(
        &self,
        task: Task,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, AgentError> {
        self.run_task_with_events(task, cancel, None).await
    }

    /// 执行一次运行；只有取消与 Abort 类错误会返回 Err，其余失败都收敛为终止原因
    pub async fn run_task_with_events(
        &self,
        task: Task,
        cancel: CancellationToken,
        events: Option<&UnboundedSender<RunEvent>>,
    ) -> Result<RunOutcome, AgentError> {
        let mut session = SessionState::new(task);
        let run_id = session.run_id();
        let task_id = session.task().task_id.clone();
        emit(events, RunEvent::Started {
            run_id,
            task_id: task_id.clone(),
        });

        if self.skip_task_ids.contains(&task_id) {
            tracing::info!(%run_id, task_id = %task_id, "task in skip list");
            emit(events, RunEvent::Terminated {
                reason: TerminationReason::Skipped,
                answer: SKIPPED_ANSWER.to_string(),
            });
            return Ok(RunOutcome {
                run_id,
                task_id,
                answer: FinalAnswer {
                    raw_text: SKIPPED_ANSWER.to_string(),
                    formatted_text: SKIPPED_ANSWER.to_string(),
                },
                reason: TerminationReason::Skipped,
                iteration_count: 0,
                tool_call_count: 0,
                messages: session.into_messages(),
            });
        }

        tracing::info!(%run_id, task_id = %task_id, has_file = session.task().file_name.is_some(), "run started");
        let deadline = self.run_timeout.map(|d| Instant::now() + d);

        self.resolve_task_file(&mut session).await;

        let mut state = RunState::Running;
        let reason = loop {
            if let RunState::Terminated(reason) = state {
                break reason;
            }
            if cancel_requested(&cancel, deadline) {
                return Err(abort_cancelled(&session, events));
            }
            state = match state {
                RunState::Running => self.reasoning_step(&mut session, events).await?,
                RunState::AwaitingTool(call) => self.tool_step(&mut session, call, events).await,
                terminated @ RunState::Terminated(_) => terminated,
            };
        };

        // 推理 → 格式化边界：取消后不再调用抽取步
        if cancel_requested(&cancel, deadline) {
            return Err(abort_cancelled(&session, events));
        }
        let answer = self.finalize(&session, reason).await;
        tracing::info!(
            %run_id,
            task_id = %task_id,
            reason = %reason,
            iterations = session.iteration_count(),
            tool_calls = session.tool_call_count(),
            answer = %answer.formatted_text,
            "run finished"
        );
        emit(events, RunEvent::Terminated {
            reason,
            answer: answer.formatted_text.clone(),
        });

        Ok(RunOutcome {
            run_id,
            task_id,
            answer,
            reason,
            iteration_count: session.iteration_count(),
            tool_call_count: session.tool_call_count(),
            messages: session.into_messages(),
        })
    }

    /// 运行开始时下载附件；失败不终止运行，只告知模型附件不可用
    async fn resolve_task_file(&self, session: &mut SessionState) {
        let Some(file_name) = session.task().file_name.clone() else {
            return;
        };
        let task_id = session.task().task_id.clone();
        match self.files.fetch(&task_id, &file_name).await {
            Ok(file) => {
                tracing::debug!(task_id = %task_id, path = %file.path().display(), "task file attached");
                session.attach_file(file);
            }
            Err(e) => {
                tracing::warn!(task_id = %task_id, file_name = %file_name, error = %e, "task file unavailable");
                session.push_note(format!(
                    "The attached file '{}' could not be retrieved ({}). Answer without it if you can.",
                    file_name, e
                ));
            }
        }
    }

    /// Running：检查推理上限，调用推理步并决定下一个状态
    async fn reasoning_step(
        &self,
        session: &mut SessionState,
        events: Option<&UnboundedSender<RunEvent>>,
    ) -> Result<RunState, AgentError> {
        if session.iteration_count() >= self.limits.max_iterations {
            tracing::warn!(run_id = %session.run_id(), max = self.limits.max_iterations, "iteration limit reached");
            return Ok(RunState::Terminated(TerminationReason::IterationLimit));
        }
        emit(events, RunEvent::Reasoning {
            iteration: session.iteration_count() + 1,
        });

        match self.reasoning.decide(session).await {
            Ok(RoutingDecision::ToolCall(call)) => {
                tracing::debug!(run_id = %session.run_id(), tool = %call.tool, "Running -> AwaitingTool");
                session.record_reasoning(Message::tool_call(&call));
                emit(events, RunEvent::ToolCall {
                    tool: call.tool.clone(),
                    args: call.args.clone(),
                });
                Ok(RunState::AwaitingTool(call))
            }
            Ok(RoutingDecision::Terminal(text)) => {
                tracing::debug!(run_id = %session.run_id(), "Running -> Terminated(normal)");
                session.record_reasoning(Message::assistant(text));
                Ok(RunState::Terminated(TerminationReason::Normal))
            }
            Err(e) => match self.recovery.handle(&e) {
                RecoveryAction::RetryWithPrompt(prompt) => {
                    tracing::warn!(run_id = %session.run_id(), error = %e, "malformed reasoning output, retrying with prompt");
                    emit(events, RunEvent::Recovery {
                        action: "RetryWithPrompt".to_string(),
                        detail: prompt.clone(),
                    });
                    session.record_reasoning(Message::user(prompt));
                    Ok(RunState::Running)
                }
                RecoveryAction::ForceAnswer => {
                    tracing::warn!(run_id = %session.run_id(), error = %e, "reasoning failed, forcing best-effort answer");
                    emit(events, RunEvent::Recovery {
                        action: "ForceAnswer".to_string(),
                        detail: e.to_string(),
                    });
                    Ok(RunState::Terminated(TerminationReason::ReasoningFailed))
                }
                RecoveryAction::Abort => {
                    emit(events, RunEvent::Recovery {
                        action: "Abort".to_string(),
                        detail: e.to_string(),
                    });
                    Err(e)
                }
            },
        }
    }

    /// AwaitingTool：检查两个上限（工具在执行前被拦下），执行并写回结果（失败同样写回）
    async fn tool_step(
        &self,
        session: &mut SessionState,
        call: ToolCall,
        events: Option<&UnboundedSender<RunEvent>>,
    ) -> RunState {
        if session.iteration_count() >= self.limits.max_iterations {
            tracing::warn!(run_id = %session.run_id(), max = self.limits.max_iterations, tool = %call.tool, "iteration limit reached, tool not executed");
            return RunState::Terminated(TerminationReason::IterationLimit);
        }
        if session.tool_call_count() >= self.limits.max_tool_calls {
            tracing::warn!(run_id = %session.run_id(), max = self.limits.max_tool_calls, tool = %call.tool, "tool call limit reached");
            return RunState::Terminated(TerminationReason::ToolCallLimit);
        }
        let result = self.executor.run(&call).await;
        if !result.success {
            tracing::warn!(
                run_id = %session.run_id(),
                tool = %call.tool,
                error = result.error.as_deref().unwrap_or(""),
                "tool failed, result fed back to reasoning"
            );
        }
        emit(events, RunEvent::ToolResult {
            tool: call.tool.clone(),
            success: result.success,
            preview: preview(&result.render(), RESULT_PREVIEW_CHARS),
        });
        session.record_tool_result(&result);
        tracing::debug!(run_id = %session.run_id(), tool_calls = session.tool_call_count(), "AwaitingTool -> Running");
        RunState::Running
    }

    /// 格式化最终答案：取尽力原始文本（可选经抽取步提炼），没有任何文本时用兜底答案
    async fn finalize(&self, session: &SessionState, reason: TerminationReason) -> FinalAnswer {
        let Some(raw) = session.best_effort_text() else {
            if reason.is_forced() {
                tracing::warn!(run_id = %session.run_id(), reason = %reason, "no usable answer text, using fallback");
            }
            return self.formatter.fallback();
        };
        let task = session.task();

        if let Some(extractor) = &self.extractor {
            match extractor.extract(task, session.messages(), &raw).await {
                Ok(extracted) if !extracted.final_answer.trim().is_empty() => {
                    let formatted = self.formatter.format_with_hint(
                        &extracted.final_answer,
                        task,
                        Some(extracted.hint()),
                    );
                    return FinalAnswer {
                        raw_text: raw,
                        formatted_text: formatted.formatted_text,
                    };
                }
                Ok(_) => {
                    tracing::warn!(run_id = %session.run_id(), "extractor returned empty answer, formatting raw text");
                }
                Err(e) => {
                    tracing::warn!(run_id = %session.run_id(), error = %e, "answer extraction failed, formatting raw text");
                }
            }
        }
        self.formatter.format(&raw, task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::tools::ToolRegistry;

    fn orchestrator(llm: MockLlmClient) -> Orchestrator {
        let executor = ToolExecutor::new(ToolRegistry::new(), 5);
        let reasoning = ReasoningStep::new(Arc::new(llm), "sys", executor.schemas());
        Orchestrator::new(reasoning, executor, AnswerFormatter::default())
    }

    #[tokio::test]
    async fn test_terminal_answer_is_formatted() {
        let orch = orchestrator(MockLlmClient::from_texts(["Thinking...\nFINAL ANSWER: $1,200"]));
        let answer = orch.run("How much?", "t-1", None).await.unwrap();
        assert_eq!(answer, "1200");
    }

    #[tokio::test]
    async fn test_skip_list_short_circuits() {
        let llm = Arc::new(MockLlmClient::new());
        let executor = ToolExecutor::new(ToolRegistry::new(), 5);
        let orch = Orchestrator::new(
            ReasoningStep::new(llm.clone(), "sys", vec![]),
            executor,
            AnswerFormatter::default(),
        )
        .with_skip_task_ids(vec!["skip-me".to_string()]);

        let outcome = orch
            .run_task(Task::new("skip-me", "q", None), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.answer.formatted_text, SKIPPED_ANSWER);
        assert_eq!(outcome.reason, TerminationReason::Skipped);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_pre_cancelled_run() {
        let orch = orchestrator(MockLlmClient::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = orch
            .run_task(Task::new("t", "q", None), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }

    #[tokio::test]
    async fn test_missing_file_becomes_note() {
        let llm = Arc::new(MockLlmClient::from_texts(["FINAL ANSWER: 3"]));
        let executor = ToolExecutor::new(ToolRegistry::new(), 5);
        let orch = Orchestrator::new(
            ReasoningStep::new(llm.clone(), "sys", vec![]),
            executor,
            AnswerFormatter::default(),
        );
        let outcome = orch
            .run_task(Task::new("t", "q", Some("data.xlsx")), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.answer.formatted_text, "3");
        let seen = &llm.calls()[0];
        assert!(seen.iter().any(|m| m.content.contains("'data.xlsx' could not be retrieved")));
    }
}
