//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供状态机决定是回灌提示、强制收尾还是终止。

use crate::core::{AgentError, RecoveryAction};

/// 语义化错误恢复：将错误映射为可执行动作
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::JsonParseError(raw) => RecoveryAction::RetryWithPrompt(format!(
                "Your previous output looked like a tool call but was not valid JSON ({raw}). \
                 To call a tool, reply with exactly one JSON object of the form \
                 {{\"tool\": \"<name>\", \"args\": {{...}}}} and nothing else. \
                 Otherwise reply with your final answer as plain text."
            )),
            // 补全能力失败不应让运行崩溃：用已有上下文给出尽力答案
            AgentError::LlmError(_) => RecoveryAction::ForceAnswer,
            AgentError::TaskFile(_) => RecoveryAction::ForceAnswer,
            AgentError::Cancelled | AgentError::ConfigError(_) => RecoveryAction::Abort,
        }
    }
}
