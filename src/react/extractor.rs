//! 答案抽取：用独立的一次 LLM 调用从整段对话中提炼最终答案
//!
//! 输出结构为 `{"is_numeric": bool, "final_answer": "..."}`（JSON Schema 由 schemars 生成并写入 prompt）。
//! final_answer 交给纯格式化步，is_numeric 作为分类提示。任何失败都由调用方回退到原始文本。

use std::sync::Arc;

use schemars::{schema_for, JsonSchema};
use serde::Deserialize;

use crate::core::{AgentError, Task};
use crate::llm::{Completion, LlmClient};
use crate::memory::{Message, Role};
use crate::react::formatter::AnswerKind;

const EXTRACTOR_SYSTEM: &str = "You are an evaluator that determines the final answer given by an Assistant. \
Assess the Assistant's last response, decide whether the answer is a number or a short string, and extract it.";

const EXTRACTOR_RULES: &str = "Your final answer should be a number OR as few words as possible OR a comma separated list of numbers and/or strings.
If you are asked for a number, don't use commas to write your number and don't use units such as $ or percent sign unless specified otherwise.
If you are asked for a string, don't use articles or abbreviations (e.g. for cities), and write the digits in plain text unless specified otherwise.
If you are asked for a comma separated list, apply the above rules depending on whether each element is a number or a string.";

/// 抽取结果
#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct ExtractedAnswer {
    /// 答案是否为数字
    pub is_numeric: bool,
    /// 从回复中提炼出的最终答案
    pub final_answer: String,
}

impl ExtractedAnswer {
    pub fn hint(&self) -> AnswerKind {
        if self.is_numeric {
            AnswerKind::Number
        } else {
            AnswerKind::Text
        }
    }
}

/// 对话的纯文本形式：工具调用轮记为 `[Tools use]`，工具结果与 system 消息不计入
pub fn format_conversation(messages: &[Message]) -> String {
    let mut out = String::from("Conversation history:\n\n");
    for m in messages {
        match m.role {
            Role::User => out.push_str(&format!("User: {}\n", m.content)),
            Role::Assistant if m.is_tool_call() => out.push_str("Assistant: [Tools use]\n"),
            Role::Assistant => out.push_str(&format!("Assistant: {}\n", m.content)),
            Role::System | Role::Tool => {}
        }
    }
    out
}

fn parse_extracted(text: &str) -> Result<ExtractedAnswer, AgentError> {
    let trimmed = text.trim();
    let json = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    };
    serde_json::from_str(json).map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, json)))
}

/// 答案抽取步
pub struct AnswerExtractor {
    llm: Arc<dyn LlmClient>,
}

impl AnswerExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn extract(
        &self,
        task: &Task,
        messages: &[Message],
        last_response: &str,
    ) -> Result<ExtractedAnswer, AgentError> {
        let schema = serde_json::to_string_pretty(&schema_for!(ExtractedAnswer)).unwrap_or_default();
        let prompt = format!(
            "You are evaluating a conversation between the User and Assistant. Decide what type of answer \
             (string or number) is expected and output the answer.\n\n\
             The original question is:\n{}\n\n\
             The entire conversation with the assistant is:\n{}\n\
             And the final response from the Assistant that you are evaluating is:\n{}\n\n\
             {}\n\n\
             Reply with ONLY a JSON object matching this schema:\n{}",
            task.question,
            format_conversation(messages),
            last_response,
            EXTRACTOR_RULES,
            schema
        );
        let request = [Message::system(EXTRACTOR_SYSTEM), Message::user(prompt)];

        let extracted = match self.llm.complete(&request, &[]).await? {
            Completion::Text(text) => parse_extracted(&text)?,
            Completion::ToolCall { arguments, .. } => serde_json::from_value(arguments)
                .map_err(|e| AgentError::JsonParseError(e.to_string()))?,
        };
        tracing::debug!(task_id = %task.task_id, answer = %extracted.final_answer, is_numeric = extracted.is_numeric, "extracted answer");
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};
    use crate::react::ToolCall;

    #[test]
    fn test_format_conversation_marks_tool_use() {
        let messages = vec![
            Message::user("How many?"),
            Message::tool_call(&ToolCall::new("wiki_search", serde_json::json!({"query": "x"}))),
            Message::assistant("There are 3.\nFINAL ANSWER: 3"),
        ];
        let text = format_conversation(&messages);
        assert!(text.contains("User: How many?\n"));
        assert!(text.contains("Assistant: [Tools use]\n"));
        assert!(text.contains("Assistant: There are 3."));
    }

    #[tokio::test]
    async fn test_extract_parses_json_reply() {
        let mock = Arc::new(MockLlmClient::from_texts([
            "```json\n{\"is_numeric\": true, \"final_answer\": \"3\"}\n```",
        ]));
        let extractor = AnswerExtractor::new(mock.clone());
        let task = Task::new("t", "How many?", None);
        let out = extractor.extract(&task, &[], "It is 3").await.unwrap();
        assert_eq!(out.final_answer, "3");
        assert_eq!(out.hint(), AnswerKind::Number);
        assert!(mock.calls()[0][1].content.contains("How many?"));
    }

    #[tokio::test]
    async fn test_extract_errors_are_reported() {
        let task = Task::new("t", "q", None);
        let garbage = AnswerExtractor::new(Arc::new(MockLlmClient::from_texts(["no json here"])));
        assert!(matches!(
            garbage.extract(&task, &[], "x").await,
            Err(AgentError::JsonParseError(_))
        ));

        let failing = AnswerExtractor::new(Arc::new(MockLlmClient::scripted(vec![Err(LlmError::Timeout)])));
        assert!(matches!(
            failing.extract(&task, &[], "x").await,
            Err(AgentError::LlmError(LlmError::Timeout))
        ));
    }
}
