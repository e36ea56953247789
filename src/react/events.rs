//! 运行过程事件：供前端或日志展示推理、工具调用与终止

use serde::Serialize;
use uuid::Uuid;

use crate::core::TerminationReason;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// 运行开始
    Started { run_id: Uuid, task_id: String },
    /// 第几次推理（从 1 开始）
    Reasoning { iteration: usize },
    /// 调用工具
    ToolCall {
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    ToolResult {
        tool: String,
        success: bool,
        preview: String,
    },
    /// 错误恢复动作
    Recovery { action: String, detail: String },
    Terminated {
        reason: TerminationReason,
        answer: String,
    },
}

/// 截取前 max 个字符作为预览
pub fn preview(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}
