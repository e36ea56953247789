//! 任务附件：按运行作用域获取，运行结束自动删除
//!
//! TaskFile 持有 tempfile::TempPath，Drop 时删除本地文件；SessionState 持有它，
//! 因此无论正常结束、强制终止还是取消，附件都会在运行结束时释放。

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tempfile::TempPath;

use crate::core::AgentError;

/// 本地附件句柄（Drop 即删除）
#[derive(Debug)]
pub struct TaskFile {
    file_name: String,
    path: TempPath,
}

impl TaskFile {
    /// 将内容写入 dir 下的临时文件，保留原扩展名（工具按扩展名识别格式）
    pub fn create_in(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<Self, AgentError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| AgentError::TaskFile(format!("create {}: {e}", dir.display())))?;
        let suffix = Path::new(file_name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("task-")
            .suffix(&suffix)
            .tempfile_in(dir)
            .map_err(|e| AgentError::TaskFile(format!("tempfile: {e}")))?;
        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| AgentError::TaskFile(format!("write {file_name}: {e}")))?;
        Ok(Self {
            file_name: file_name.to_string(),
            path: file.into_temp_path(),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// 附件来源：fetch_task_file(task_id, file_name) -> 本地文件
#[async_trait]
pub trait TaskFileFetcher: Send + Sync {
    async fn fetch(&self, task_id: &str, file_name: &str) -> Result<TaskFile, AgentError>;
}

/// 从题目服务 `{base_url}/files/{task_id}` 下载附件
pub struct HttpTaskFileFetcher {
    client: Client,
    base_url: String,
    dir: PathBuf,
}

impl HttpTaskFileFetcher {
    pub fn new(base_url: impl Into<String>, dir: PathBuf, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            dir,
        }
    }
}

#[async_trait]
impl TaskFileFetcher for HttpTaskFileFetcher {
    async fn fetch(&self, task_id: &str, file_name: &str) -> Result<TaskFile, AgentError> {
        let url = format!("{}/files/{}", self.base_url, task_id);
        tracing::info!(%url, file_name, "fetching task file");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AgentError::TaskFile(format!("request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AgentError::TaskFile(format!("HTTP {} for {url}", resp.status())));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AgentError::TaskFile(format!("read body: {e}")))?;
        TaskFile::create_in(&self.dir, file_name, &bytes)
    }
}

/// 未配置附件来源时使用：总是失败，运行继续但提示模型附件不可用
#[derive(Debug, Default)]
pub struct NoFileFetcher;

#[async_trait]
impl TaskFileFetcher for NoFileFetcher {
    async fn fetch(&self, _task_id: &str, file_name: &str) -> Result<TaskFile, AgentError> {
        Err(AgentError::TaskFile(format!(
            "no file source configured for {file_name}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let file = TaskFile::create_in(dir.path(), "sales.xlsx", b"data").unwrap();
        let path = file.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "xlsx");
        assert_eq!(file.file_name(), "sales.xlsx");
        drop(file);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_no_file_fetcher_fails() {
        let err = NoFileFetcher.fetch("t", "a.mp3").await.unwrap_err();
        assert!(matches!(err, AgentError::TaskFile(_)));
    }
}
