//! 状态机定义：RunState 与终止原因
//!
//! Running ⇄ AwaitingTool 构成环，由 iteration_count / tool_call_count 两个单调计数器严格约束；
//! Terminated 为唯一出口。

use serde::Serialize;

use crate::react::ToolCall;

/// 编排状态
#[derive(Clone, Debug, PartialEq)]
pub enum RunState {
    /// 等待推理步决定下一步
    Running,
    /// 推理步请求了工具，等待执行
    AwaitingTool(ToolCall),
    Terminated(TerminationReason),
}

/// 运行终止原因
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// 推理步给出最终答案
    Normal,
    /// iteration_count 达到 max_iterations
    IterationLimit,
    /// tool_call_count 达到 max_tool_calls
    ToolCallLimit,
    /// 补全能力失败，用已有信息尽力作答
    ReasoningFailed,
    /// 任务在跳过列表中，未运行
    Skipped,
}

impl TerminationReason {
    /// 是否为强制终止（答案为尽力或兜底文本）
    pub fn is_forced(self) -> bool {
        !matches!(self, Self::Normal | Self::Skipped)
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Normal => "normal",
            Self::IterationLimit => "iteration_limit",
            Self::ToolCallLimit => "tool_call_limit",
            Self::ReasoningFailed => "reasoning_failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// 两个终止上限，构造时固定
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunLimits {
    pub max_iterations: usize,
    pub max_tool_calls: usize,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_tool_calls: 8,
        }
    }
}
