//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）

pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod traits;

pub use deepseek::{
    create_deepseek_client, deepseek_api_key, resolve_deepseek_model, DEEPSEEK_CHAT,
    DEEPSEEK_REASONER,
};
pub use mock::MockLlmClient;
pub use openai::{render_tools_prompt, OpenAiClient, TokenUsage};
pub use traits::{Completion, LlmClient, LlmError, RetryConfig, RetryingLlmClient};
