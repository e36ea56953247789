//! 工具参数 Schema：schemars 自动生成 + 结构化校验
//!
//! - `args_schema::<T>()`：由参数结构体派生 JSON Schema，作为工具的 parameters_schema
//! - `validate_args`：调用前的结构化校验（对象、required、顶层属性类型、additionalProperties）
//! - `tool_call_schema_json`：文本协议下「合法 tool call」的 JSON 结构，拼入 system prompt

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};
use serde::Serialize;
use serde_json::Value;

/// 提供给推理步的工具描述
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 工具调用请求格式：与 `{"tool": "...", "args": {...}}` 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 工具名，必须是 Available tools 中的一个
    pub tool: String,
    /// 工具参数，需满足该工具的 parameters schema
    pub args: HashMap<String, Value>,
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// 由参数结构体派生 parameters schema，去掉 `$schema` / `title` 等与调用无关的键
pub fn args_schema<T: JsonSchema>() -> Value {
    let mut value = serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| empty_object_schema());
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

pub fn empty_object_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

/// 按 schema 校验参数；返回的错误文本会作为失败的工具结果回灌给模型
pub fn validate_args(schema: &Value, args: &Value) -> Result<(), String> {
    let obj = args
        .as_object()
        .ok_or_else(|| format!("arguments must be a JSON object, got {}", type_name(args)))?;

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if !obj.contains_key(field) {
                return Err(format!("missing required field: '{field}'"));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    for (key, value) in obj {
        match properties.and_then(|p| p.get(key)) {
            Some(prop) => {
                if let Some(expected) = prop.get("type") {
                    if !type_matches(expected, value) {
                        return Err(format!(
                            "field '{key}' expected {}, got {}",
                            expected,
                            type_name(value)
                        ));
                    }
                }
            }
            None => {
                if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
                    return Err(format!("unexpected field: '{key}'"));
                }
            }
        }
    }
    Ok(())
}

fn type_matches(expected: &Value, value: &Value) -> bool {
    match expected {
        Value::String(t) => single_type_matches(t, value),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| single_type_matches(t, value)),
        _ => true,
    }
}

fn single_type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct QueryArgs {
        query: String,
        limit: Option<u32>,
    }

    #[test]
    fn test_derived_schema_shape() {
        let schema = args_schema::<QueryArgs>();
        assert_eq!(schema["type"], "object");
        assert!(schema.get("$schema").is_none());
        assert_eq!(schema["required"], json!(["query"]));
    }

    #[test]
    fn test_validate_accepts_matching_args() {
        let schema = args_schema::<QueryArgs>();
        assert!(validate_args(&schema, &json!({"query": "x"})).is_ok());
        assert!(validate_args(&schema, &json!({"query": "x", "limit": 3})).is_ok());
        assert!(validate_args(&schema, &json!({"query": "x", "limit": null})).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_args() {
        let schema = args_schema::<QueryArgs>();
        let err = validate_args(&schema, &json!({})).unwrap_err();
        assert!(err.contains("query"));
        assert!(validate_args(&schema, &json!({"query": 5})).is_err());
        assert!(validate_args(&schema, &json!("not an object")).is_err());
    }

    #[test]
    fn test_additional_properties_false() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "additionalProperties": false
        });
        assert!(validate_args(&schema, &json!({"a": "x"})).is_ok());
        assert!(validate_args(&schema, &json!({"a": "x", "b": 1})).is_err());
    }

    #[test]
    fn test_tool_call_schema_mentions_fields() {
        let s = tool_call_schema_json();
        assert!(s.contains("tool"));
        assert!(s.contains("args"));
    }
}
