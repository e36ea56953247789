//! 会话消息：单次运行内的对话轮次
//!
//! 每条消息带角色与内容；助手发起的工具调用、工具返回的结果以可选元数据的形式挂在消息上，
//! 供下一轮推理与答案抽取使用。

use serde::{Deserialize, Serialize};

use crate::react::ToolCall;
use crate::tools::ToolResult;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// 助手消息：本轮发起的工具调用
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    /// 工具消息：产生该结果的工具名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call: None,
            tool_name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    /// 助手发起工具调用；content 为调用的 JSON 形式，便于不支持原生工具调用的后端回放
    pub fn tool_call(call: &ToolCall) -> Self {
        Self {
            role: Role::Assistant,
            content: call.to_envelope(),
            tool_call: Some(call.clone()),
            tool_name: None,
        }
    }

    /// 工具结果（成功或失败都会写入，失败作为下一轮推理的上下文）
    pub fn tool_result(result: &ToolResult) -> Self {
        Self {
            role: Role::Tool,
            content: result.render(),
            tool_call: None,
            tool_name: Some(result.tool_name.clone()),
        }
    }

    pub fn is_tool_call(&self) -> bool {
        self.tool_call.is_some()
    }
}
