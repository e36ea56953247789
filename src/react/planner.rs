//! 推理步：决定下一步是调用工具还是给出最终答案
//!
//! ReasoningStep 把 system prompt、附件路径提示与会话消息交给 LLM；原生工具调用直接映射，
//! 文本则经 parse_llm_output 解析 JSON 工具调用。决策是确定性的，不修改会话。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{AgentError, SessionState};
use crate::llm::{Completion, LlmClient};
use crate::memory::Message;
use crate::tools::ToolSchema;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that answers benchmark questions and can use tools to do so.
If a tool is not available, try to find the information online. You can also use your own knowledge to answer the question.
Explain step by step how you arrive at the answer.
When you have finished, reply with the final answer and do not ask a question. End your reply with: FINAL ANSWER: <answer>
The answer should be a number OR as few words as possible OR a comma separated list of numbers and/or strings.
If you are asked for a number, do not use commas in it and do not add units such as $ or percent sign unless specified otherwise.
If you are asked for a string, do not use articles or abbreviations, and write digits in plain text unless specified otherwise.";

fn empty_args() -> Value {
    Value::Object(Default::default())
}

/// 工具调用请求（JSON：{"tool": "wiki_search", "args": {"query": "..."}}）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default = "empty_args")]
    pub args: Value,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }

    /// 文本协议下的 JSON 形式
    pub fn to_envelope(&self) -> String {
        serde_json::json!({"tool": self.tool, "args": self.args}).to_string()
    }
}

/// 推理步的路由结果
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingDecision {
    ToolCall(ToolCall),
    /// 最终答案的原始文本
    Terminal(String),
}

/// 从文本中找出可能的工具调用 JSON：```json 代码块、整体为对象、或含 "tool" 的 {...} 片段
fn envelope_candidate(trimmed: &str) -> Option<&str> {
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }
    if trimmed.contains("\"tool\"") {
        if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
            if start < end {
                return Some(&trimmed[start..=end]);
            }
        }
    }
    None
}

/// 解析 LLM 文本：含有效工具调用 JSON 则为 ToolCall，否则为 Terminal；
/// 看起来是工具调用但无法解析时返回 JsonParseError
pub fn parse_llm_output(output: &str) -> Result<RoutingDecision, AgentError> {
    let trimmed = output.trim();
    let Some(candidate) = envelope_candidate(trimmed) else {
        return Ok(RoutingDecision::Terminal(trimmed.to_string()));
    };
    if !candidate.contains("\"tool\"") {
        return Ok(RoutingDecision::Terminal(trimmed.to_string()));
    }

    let parsed: ToolCall = serde_json::from_str(candidate)
        .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, candidate)))?;

    if parsed.tool.trim().is_empty() {
        Ok(RoutingDecision::Terminal(trimmed.to_string()))
    } else {
        Ok(RoutingDecision::ToolCall(parsed))
    }
}

/// 推理步：持有 LLM、system prompt 与注册表的工具描述
pub struct ReasoningStep {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    tools: Vec<ToolSchema>,
}

impl ReasoningStep {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        system_prompt: impl Into<String>,
        tools: Vec<ToolSchema>,
    ) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
            tools,
        }
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    fn system_message(&self, session: &SessionState) -> Message {
        let mut system = self.system_prompt.clone();
        if let (Some(path), Some(name)) = (session.task_file_path(), session.task().file_name.as_deref()) {
            system.push_str(&format!(
                "\n\nThe question comes with an attached file '{}'. It has been downloaded to file_path: {}\n\
                 Use this exact file_path for every tool that needs the file. Never use the file name mentioned in the question.",
                name,
                path.display()
            ));
        }
        Message::system(system)
    }

    pub async fn decide(&self, session: &SessionState) -> Result<RoutingDecision, AgentError> {
        let mut messages = Vec::with_capacity(session.messages().len() + 1);
        messages.push(self.system_message(session));
        messages.extend_from_slice(session.messages());

        match self.llm.complete(&messages, &self.tools).await? {
            Completion::ToolCall {
                name, arguments, ..
            } => Ok(RoutingDecision::ToolCall(ToolCall::new(name, arguments))),
            Completion::Text(text) => parse_llm_output(&text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Task;
    use crate::llm::MockLlmClient;
    use serde_json::json;

    #[test]
    fn test_parse_plain_answer() {
        let out = parse_llm_output("The capital is Paris.\nFINAL ANSWER: Paris").unwrap();
        assert_eq!(
            out,
            RoutingDecision::Terminal("The capital is Paris.\nFINAL ANSWER: Paris".into())
        );
    }

    #[test]
    fn test_parse_tool_call_variants() {
        let expected = RoutingDecision::ToolCall(ToolCall::new("wiki_search", json!({"query": "Rust"})));
        assert_eq!(
            parse_llm_output(r#"{"tool": "wiki_search", "args": {"query": "Rust"}}"#).unwrap(),
            expected
        );
        assert_eq!(
            parse_llm_output("Let me search.\n```json\n{\"tool\": \"wiki_search\", \"args\": {\"query\": \"Rust\"}}\n```").unwrap(),
            expected
        );
        assert_eq!(
            parse_llm_output(r#"I will call {"tool": "wiki_search", "args": {"query": "Rust"}} now"#).unwrap(),
            expected
        );
    }

    #[test]
    fn test_missing_args_defaults_to_empty_object() {
        let out = parse_llm_output(r#"{"tool": "list"}"#).unwrap();
        assert_eq!(out, RoutingDecision::ToolCall(ToolCall::new("list", json!({}))));
    }

    #[test]
    fn test_json_without_tool_is_terminal() {
        let out = parse_llm_output(r#"{"answer": 4}"#).unwrap();
        assert!(matches!(out, RoutingDecision::Terminal(_)));
    }

    #[test]
    fn test_malformed_envelope_is_error() {
        let err = parse_llm_output(r#"{"tool": "wiki_search", "args": {"query": }"#).unwrap_err();
        assert!(matches!(err, AgentError::JsonParseError(_)));
    }

    #[test]
    fn test_envelope_roundtrip() {
        let call = ToolCall::new("read_file", json!({"file_path": "/tmp/a.py"}));
        assert_eq!(
            parse_llm_output(&call.to_envelope()).unwrap(),
            RoutingDecision::ToolCall(call)
        );
    }

    #[tokio::test]
    async fn test_decide_maps_native_tool_call() {
        let mock = Arc::new(MockLlmClient::scripted(vec![Ok(Completion::ToolCall {
            id: Some("call_1".into()),
            name: "wiki_search".into(),
            arguments: json!({"query": "x"}),
        })]));
        let step = ReasoningStep::new(mock.clone(), DEFAULT_SYSTEM_PROMPT, vec![]);
        let session = SessionState::new(Task::new("t", "q?", None));
        let out = step.decide(&session).await.unwrap();
        assert_eq!(out, RoutingDecision::ToolCall(ToolCall::new("wiki_search", json!({"query": "x"}))));

        let seen = &mock.calls()[0];
        assert_eq!(seen[0].role, crate::memory::Role::System);
        assert_eq!(seen[1].content, "q?");
    }

    #[tokio::test]
    async fn test_decide_includes_file_path_hint() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockLlmClient::from_texts(["FINAL ANSWER: 1"]));
        let step = ReasoningStep::new(mock.clone(), "sys", vec![]);
        let mut session = SessionState::new(Task::new("t", "q", Some("code.py")));
        let file = crate::tools::TaskFile::create_in(dir.path(), "code.py", b"print(1)").unwrap();
        let path = file.path().display().to_string();
        session.attach_file(file);

        step.decide(&session).await.unwrap();
        let system = &mock.calls()[0][0].content;
        assert!(system.contains(&path));
        assert!(system.contains("'code.py'"));
    }
}
