//! 沙箱文件系统工具
//!
//! SafeFs 绑定附件目录，所有路径经 resolve 校验必须在根下（禁止 ../ 逃逸）；
//! ReadFileTool 基于 SafeFs 读取任务附件的文本内容。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::schema::args_schema;
use crate::tools::Tool;

/// 沙箱文件系统：绑定根目录，resolve 校验路径在根下，防止路径逃逸
#[derive(Debug, Clone)]
pub struct SafeFs {
    root_dir: PathBuf,
}

impl SafeFs {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        let root = root_dir.as_ref().to_path_buf();
        let _ = std::fs::create_dir_all(&root);
        let root_dir = root.canonicalize().unwrap_or(root);
        Self { root_dir }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// 解析路径：相对路径基于根目录，绝对路径原样使用；结果必须位于根目录内
    pub fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        let path = path.trim().trim_start_matches("./");
        let full = self.root_dir.join(path);
        let canonical = full
            .canonicalize()
            .map_err(|_| format!("Path not found: {}", path))?;
        if canonical.starts_with(&self.root_dir) {
            Ok(canonical)
        } else {
            Err(format!("Path outside task file directory: {}", path))
        }
    }

    pub fn read_text(&self, path: &str) -> Result<String, String> {
        let resolved = self.resolve(path)?;
        let bytes = std::fs::read(&resolved).map_err(|e| format!("Read failed: {}", e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[derive(Deserialize, JsonSchema)]
struct ReadFileArgs {
    /// 附件的本地路径（system prompt 中给出的 file_path）
    file_path: String,
}

/// 读取附件文本（代码、CSV、Markdown 等）
pub struct ReadFileTool {
    fs: SafeFs,
}

impl ReadFileTool {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            fs: SafeFs::new(root),
        }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the text content of the task's attached file. Use the exact file_path given in the instructions, never the file name from the question."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<ReadFileArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: ReadFileArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        self.fs.read_text(&args.file_path).map(Value::String)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_read_file_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        let tool = ReadFileTool::new(dir.path());

        let out = tool
            .execute(json!({"file_path": path.to_string_lossy()}))
            .await
            .unwrap();
        assert_eq!(out, json!("hello"));

        let out = tool.execute(json!({"file_path": "notes.txt"})).await.unwrap();
        assert_eq!(out, json!("hello"));
    }

    #[tokio::test]
    async fn test_read_file_rejects_escape() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::NamedTempFile::new().unwrap();
        let tool = ReadFileTool::new(root.path());
        let err = tool
            .execute(json!({"file_path": outside.path().to_string_lossy()}))
            .await
            .unwrap_err();
        assert!(err.contains("outside") || err.contains("not found"));
    }
}
