//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 三种模式：按脚本依次返回预设结果、重复同一结果、或回显最后一条 User 消息为最终答案。
//! 每次调用的消息都会被记录，便于测试检查推理步看到的上下文。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{Completion, LlmClient, LlmError};
use crate::memory::{Message, Role};
use crate::tools::ToolSchema;

#[derive(Debug)]
enum Script {
    Echo,
    Queue(VecDeque<Result<Completion, LlmError>>),
    Repeat(Completion),
}

/// Mock 客户端
#[derive(Debug)]
pub struct MockLlmClient {
    script: Mutex<Script>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::with_script(Script::Echo)
    }
}

impl MockLlmClient {
    fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 回显模式：返回 `FINAL ANSWER: <最后一条 User 消息>`
    pub fn new() -> Self {
        Self::default()
    }

    /// 按顺序返回预设结果；用尽后返回 EmptyResponse
    pub fn scripted(responses: Vec<Result<Completion, LlmError>>) -> Self {
        Self::with_script(Script::Queue(responses.into()))
    }

    /// 按顺序返回预设文本
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::scripted(
            texts
                .into_iter()
                .map(|t| Ok(Completion::Text(t.into())))
                .collect(),
        )
    }

    /// 每次都返回同一结果
    pub fn repeating(completion: Completion) -> Self {
        Self::with_script(Script::Repeat(completion))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 每次调用时收到的消息
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[ToolSchema],
    ) -> Result<Completion, LlmError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());

        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *script {
            Script::Echo => {
                let last_user = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or("(no input)");
                Ok(Completion::Text(format!("FINAL ANSWER: {}", last_user)))
            }
            Script::Queue(queue) => queue.pop_front().unwrap_or(Err(LlmError::EmptyResponse)),
            Script::Repeat(completion) => Ok(completion.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_mode() {
        let mock = MockLlmClient::new();
        let out = mock.complete(&[Message::user("hi")], &[]).await.unwrap();
        assert_eq!(out, Completion::Text("FINAL ANSWER: hi".into()));
    }

    #[tokio::test]
    async fn test_script_exhaustion() {
        let mock = MockLlmClient::from_texts(["one"]);
        assert_eq!(
            mock.complete(&[], &[]).await.unwrap(),
            Completion::Text("one".into())
        );
        assert_eq!(mock.complete(&[], &[]).await, Err(LlmError::EmptyResponse));
        assert_eq!(mock.call_count(), 2);
    }
}
