//! DeepSeek 后端：OpenAI 兼容端点上的 OpenAiClient

use crate::llm::OpenAiClient;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";
pub const DEEPSEEK_REASONER: &str = "deepseek-reasoner";

/// DEEPSEEK_API_KEY，未设置时退回 OPENAI_API_KEY
pub fn deepseek_api_key() -> Option<String> {
    ["DEEPSEEK_API_KEY", "OPENAI_API_KEY"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|key| !key.trim().is_empty())
}

/// 配置中的模型名不是 deepseek-* 时（如默认的 gpt-4o-mini），改用 DEEPSEEK_MODEL 或 deepseek-chat
pub fn resolve_deepseek_model(configured: &str) -> String {
    if configured.starts_with("deepseek") {
        return configured.to_string();
    }
    std::env::var("DEEPSEEK_MODEL")
        .ok()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEEPSEEK_CHAT.to_string())
}

pub fn create_deepseek_client(model: &str, api_key: &str) -> OpenAiClient {
    OpenAiClient::new(Some(DEEPSEEK_BASE_URL), model, Some(api_key))
}
