//! Python 脚本执行：仅运行附件目录内的脚本
//!
//! 通过配置的解释器（默认 python3）执行，带超时；返回 stdout，stdout 为空时返回 stderr。
//! 非零退出码视为执行失败，错误中带上 stderr（为空时带 stdout）。

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use crate::tools::filesystem::SafeFs;
use crate::tools::schema::args_schema;
use crate::tools::Tool;

#[derive(Deserialize, JsonSchema)]
struct RunPythonArgs {
    /// 附件中 .py 脚本的本地路径
    file_path: String,
}

pub struct RunPythonTool {
    fs: SafeFs,
    python_bin: String,
    timeout_secs: u64,
}

impl RunPythonTool {
    pub fn new(root: impl AsRef<Path>, python_bin: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            fs: SafeFs::new(root),
            python_bin: python_bin.into(),
            timeout_secs,
        }
    }
}

#[async_trait]
impl Tool for RunPythonTool {
    fn name(&self) -> &str {
        "run_python"
    }

    fn description(&self) -> &str {
        "Execute the task's attached Python script and return its output. Use the exact file_path given in the instructions."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<RunPythonArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: RunPythonArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        let script = self.fs.resolve(&args.file_path)?;

        tracing::info!(script = %script.display(), "run_python execute");

        let output = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            Command::new(&self.python_bin)
                .arg(&script)
                .current_dir(self.fs.root())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| format!("Script timed out after {}s", self.timeout_secs))?
        .map_err(|e| format!("Execution failed: {}", e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            let detail = if stderr.is_empty() { stdout } else { stderr };
            tracing::warn!(script = %script.display(), status = %output.status, "run_python failed");
            return Err(format!("Script exited with {}: {}", output.status, detail));
        }
        if stdout.is_empty() {
            Ok(Value::String(stderr))
        } else {
            Ok(Value::String(stdout))
        }
    }
}
