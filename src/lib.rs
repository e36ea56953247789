//! GAIA Agent - 基准问答智能体
//!
//! 模块划分：
//! - **agent**: 批量运行时（并发跑题目列表并汇总答案）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 状态机编排器、会话状态、错误与恢复、会话监管、运行调度
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 会话消息
//! - **observability**: 日志初始化
//! - **react**: 推理步、答案抽取与格式化、运行事件
//! - **tools**: 工具注册表、执行器、任务附件与内置工具

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;
