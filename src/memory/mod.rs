//! 记忆层：单次运行内的对话消息（运行结束即销毁，不做持久化）

pub mod conversation;

pub use conversation::{Message, Role};
