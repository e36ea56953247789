//! 认知层：推理步、答案抽取、答案格式化与运行事件

pub mod events;
pub mod extractor;
pub mod formatter;
pub mod planner;

pub use events::RunEvent;
pub use extractor::{AnswerExtractor, ExtractedAnswer};
pub use formatter::{AnswerFormatter, AnswerKind, FinalAnswer, FALLBACK_ANSWER};
pub use planner::{parse_llm_output, ReasoningStep, RoutingDecision, ToolCall, DEFAULT_SYSTEM_PROMPT};
