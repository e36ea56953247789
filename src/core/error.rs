//! 运行级错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 AgentError 决定 RetryWithPrompt / ForceAnswer / Abort。
//! 工具层失败（ToolError）不会出现在这里：它们在 ToolExecutor 边界被转成失败的 ToolResult。

use thiserror::Error;

use crate::llm::LlmError;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 外部取消或截止时间到期；资源已释放
    #[error("Run cancelled")]
    Cancelled,

    /// 致命配置错误（如必需工具未注册），只会在启动时出现
    #[error("Config error: {0}")]
    ConfigError(String),

    /// 模型输出看起来是工具调用但 JSON 无法解析
    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),

    #[error("Task file error: {0}")]
    TaskFile(String),
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone)]
pub enum RecoveryAction {
    /// 将提示注入下一轮，让模型重新输出（如 JSON 格式错误）
    RetryWithPrompt(String),
    /// 放弃推理，用现有信息给出尽力答案
    ForceAnswer,
    /// 终止运行并向调用方返回错误
    Abort,
}
