//! 任务与单次运行的会话状态
//!
//! SessionState 只属于一次运行：消息历史、两个单调计数器、任务本身与已解析的附件句柄。
//! 计数器只能通过 record_* 递增，附件随 SessionState 一起释放（包括强制终止与取消路径）。

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::memory::{Message, Role};
use crate::react::parse_llm_output;
use crate::react::RoutingDecision;
use crate::tools::{TaskFile, ToolResult};

/// 一道基准题目：创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub question: String,
    /// 关联附件名；空字符串视为无附件
    #[serde(default, deserialize_with = "empty_as_none")]
    pub file_name: Option<String>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

impl Task {
    pub fn new(
        task_id: impl Into<String>,
        question: impl Into<String>,
        file_name: Option<&str>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            question: question.into(),
            file_name: file_name
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        }
    }
}

/// 单次运行的可变状态（不跨运行共享）
#[derive(Debug)]
pub struct SessionState {
    run_id: Uuid,
    task: Task,
    messages: Vec<Message>,
    iteration_count: usize,
    tool_call_count: usize,
    task_file: Option<TaskFile>,
}

impl SessionState {
    /// 新建会话：首条消息为题目本身，计数器均为 0
    pub fn new(task: Task) -> Self {
        let messages = vec![Message::user(task.question.clone())];
        Self {
            run_id: Uuid::new_v4(),
            task,
            messages,
            iteration_count: 0,
            tool_call_count: 0,
            task_file: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    pub fn tool_call_count(&self) -> usize {
        self.tool_call_count
    }

    pub fn task_file_path(&self) -> Option<&Path> {
        self.task_file.as_ref().map(|f| f.path())
    }

    pub fn attach_file(&mut self, file: TaskFile) {
        self.task_file = Some(file);
    }

    /// 附加说明（如附件下载失败），不计入任何计数器
    pub fn push_note(&mut self, note: impl Into<String>) {
        self.messages.push(Message::user(note));
    }

    /// 推理步产生的一轮：追加消息并递增 iteration_count
    pub fn record_reasoning(&mut self, message: Message) {
        self.messages.push(message);
        self.iteration_count += 1;
    }

    /// 工具执行完成（成功或失败）：追加结果并递增 tool_call_count
    pub fn record_tool_result(&mut self, result: &ToolResult) {
        self.messages.push(Message::tool_result(result));
        self.tool_call_count += 1;
    }

    /// 强制终止时可用的最佳原始答案：最后一条非空、且不是工具调用的助手文本
    pub fn best_effort_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant && !m.is_tool_call())
            .map(|m| m.content.trim())
            .find(|c| !c.is_empty() && matches!(parse_llm_output(c), Ok(RoutingDecision::Terminal(_))))
            .map(String::from)
    }

    /// 结束运行：交出消息历史，附件在此处随 self 一起释放
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
