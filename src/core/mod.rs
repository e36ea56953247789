//! 核心编排层：错误与恢复、会话状态、状态机、编排器、构建器、会话监管与运行调度

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod session;
pub mod session_supervisor;
pub mod state;
pub mod task_scheduler;

pub use builder::{create_llm_from_config, AgentBuilder};
pub use error::{AgentError, RecoveryAction};
pub use orchestrator::{Orchestrator, RunOutcome, SKIPPED_ANSWER};
pub use recovery::RecoveryEngine;
pub use session::{SessionState, Task};
pub use session_supervisor::SessionSupervisor;
pub use state::{RunLimits, RunState, TerminationReason};
pub use task_scheduler::TaskScheduler;
