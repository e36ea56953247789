pub mod botany;
pub mod commutativity;
pub mod executor;
pub mod filesystem;
pub mod python;
pub mod registry;
pub mod sales;
pub mod schema;
pub mod search;
pub mod task_file;
pub mod web;

pub use botany::ClassifyPlantPartsTool;
pub use commutativity::CommutativityTool;
pub use executor::{ToolExecutor, ToolResult};
pub use filesystem::{ReadFileTool, SafeFs};
pub use python::RunPythonTool;
pub use registry::{FnTool, Tool, ToolError, ToolRegistry};
pub use sales::SumSelectedItemsTool;
pub use schema::{args_schema, tool_call_schema_json, validate_args, ToolSchema};
pub use search::{ArxivSearchTool, WebSearchTool, WikiSearchTool};
pub use task_file::{HttpTaskFileFetcher, NoFileFetcher, TaskFile, TaskFileFetcher};
pub use web::FetchUrlTool;
