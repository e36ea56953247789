//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock）实现 LlmClient：complete(messages, tools) 返回
//! 原生工具调用或纯文本。重试是可选的装饰器 RetryingLlmClient，状态机本身从不重试。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::memory::Message;
use crate::tools::ToolSchema;

/// 一次补全的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// 后端原生的工具调用
    ToolCall {
        id: Option<String>,
        name: String,
        arguments: Value,
    },
    /// 纯文本（可能内含 JSON 工具调用，由推理步解析）
    Text(String),
}

/// 补全能力的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Empty response")]
    EmptyResponse,
}

impl LlmError {
    /// 超时、限流与网络错误可重试；空响应不重试
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::EmptyResponse)
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成：消息历史 + 可用工具描述
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<Completion, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 重试策略：指数退避，第 n 次重试等待 base_delay_ms * 2^n（限流时取两者较大值）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
        }
    }
}

impl RetryConfig {
    fn delay_for(&self, attempt: u32, err: &LlmError) -> Duration {
        let backoff = self.base_delay_ms.saturating_mul(1u64 << attempt.min(16));
        let ms = match err {
            LlmError::RateLimited { retry_after_ms } => backoff.max(*retry_after_ms),
            _ => backoff,
        };
        Duration::from_millis(ms)
    }
}

/// 带重试的客户端装饰器
pub struct RetryingLlmClient {
    inner: Arc<dyn LlmClient>,
    config: RetryConfig,
}

impl RetryingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl LlmClient for RetryingLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<Completion, LlmError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(messages, tools).await {
                Ok(completion) => return Ok(completion),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.delay_for(attempt, &e);
                    tracing::warn!(error = %e, attempt = attempt + 1, delay_ms = delay.as_millis() as u64, "LLM call failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn test_retryable_errors() {
        assert!(LlmError::Timeout.is_retryable());
        assert!(LlmError::Request("reset".into()).is_retryable());
        assert!(!LlmError::EmptyResponse.is_retryable());
    }

    #[test]
    fn test_backoff_respects_rate_limit_hint() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 100,
        };
        assert_eq!(config.delay_for(0, &LlmError::Timeout), Duration::from_millis(100));
        assert_eq!(config.delay_for(2, &LlmError::Timeout), Duration::from_millis(400));
        assert_eq!(
            config.delay_for(0, &LlmError::RateLimited { retry_after_ms: 1000 }),
            Duration::from_millis(1000)
        );
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_failure() {
        let mock = Arc::new(MockLlmClient::scripted(vec![
            Err(LlmError::Timeout),
            Ok(Completion::Text("FINAL ANSWER: 4".into())),
        ]));
        let client = RetryingLlmClient::new(
            mock.clone(),
            RetryConfig {
                max_retries: 2,
                base_delay_ms: 1,
            },
        );
        let out = client.complete(&[Message::user("2+2")], &[]).await.unwrap();
        assert_eq!(out, Completion::Text("FINAL ANSWER: 4".into()));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_on_non_retryable() {
        let mock = Arc::new(MockLlmClient::scripted(vec![Err(LlmError::EmptyResponse)]));
        let client = RetryingLlmClient::new(mock.clone(), RetryConfig::default());
        let err = client.complete(&[], &[]).await.unwrap_err();
        assert_eq!(err, LlmError::EmptyResponse);
        assert_eq!(mock.call_count(), 1);
    }
}
