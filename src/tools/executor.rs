//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，run(call) 在超时内调用 registry.invoke。
//! 任何失败（未知工具、参数不合法、工具报错、超时）都被转换为 success=false 的 ToolResult，
//! 从不越过执行器边界；每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tokio::time::timeout;

use crate::react::ToolCall;
use crate::tools::{ToolError, ToolRegistry, ToolSchema};

/// 一次工具调用的结果；失败同样写入会话，作为下一轮推理的上下文
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub success: bool,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(tool_name: impl Into<String>, payload: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            payload,
            error: None,
        }
    }

    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            payload: Value::Null,
            error: Some(error.into()),
        }
    }

    /// 写入会话时的文本形式
    pub fn render(&self) -> String {
        if !self.success {
            return format!("Error: {}", self.error.as_deref().unwrap_or("unknown failure"));
        }
        match &self.payload {
            Value::String(s) => s.clone(),
            Value::Null => "(no output)".to_string(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        }
    }
}

/// 工具执行器：对每次调用施加超时，并将所有失败收敛为 ToolResult
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
    max_result_chars: usize,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry: Arc::new(registry),
            timeout: Duration::from_secs(timeout_secs),
            max_result_chars: 8000,
        }
    }

    pub fn with_max_result_chars(mut self, max: usize) -> Self {
        self.max_result_chars = max.max(1);
        self
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.registry.schemas()
    }

    pub async fn run(&self, call: &ToolCall) -> ToolResult {
        let start = Instant::now();
        let result = timeout(self.timeout, self.registry.invoke(&call.tool, call.args.clone())).await;

        let outcome = match &result {
            Ok(Ok(_)) => "ok",
            Ok(Err(ToolError::UnknownTool(_))) => "unknown_tool",
            Ok(Err(ToolError::SchemaValidation { .. })) => "invalid_args",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.tool,
            "ok": outcome == "ok",
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&call.args),
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(Ok(payload)) => ToolResult::success(&call.tool, self.truncate(payload)),
            Ok(Err(e)) => ToolResult::failure(&call.tool, e.to_string()),
            Err(_) => ToolResult::failure(
                &call.tool,
                format!("Tool {} timed out after {}s", call.tool, self.timeout.as_secs()),
            ),
        }
    }

    fn truncate(&self, payload: Value) -> Value {
        match payload {
            Value::String(s) if s.chars().count() > self.max_result_chars => {
                let cut: String = s.chars().take(self.max_result_chars).collect();
                Value::String(format!("{cut}...[truncated]"))
            }
            other => other,
        }
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
