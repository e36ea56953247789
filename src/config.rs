//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `GAIA__*` 覆盖（双下划线表示嵌套，如 `GAIA__LLM__PROVIDER=mock`）。
//! 配置在进程启动时加载一次，经 [`install`] 固化为全局只读状态，运行期间不再修改。

use std::path::PathBuf;
use std::sync::OnceLock;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentSection,
    pub llm: LlmSection,
    pub answer: AnswerSection,
    pub tools: ToolsSection,
    pub api: ApiSection,
}

/// [agent] 段：状态机上限、并发与跳过列表
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 推理步数上限（每次 Reasoning 计一次）
    pub max_iterations: usize,
    /// 工具调用上限，独立于推理步数且通常更小
    pub max_tool_calls: usize,
    /// 批量模式下同时运行的任务数
    pub max_concurrent_runs: usize,
    /// 单次运行的截止时间（秒），到期后在步边界取消
    pub run_timeout_secs: Option<u64>,
    /// 直接返回 "Skipped" 的任务 ID
    pub skip_task_ids: Vec<String>,
    /// 启动时必须已注册的工具；缺失视为致命配置错误
    pub required_tools: Vec<String>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_tool_calls: 8,
            max_concurrent_runs: 3,
            run_timeout_secs: None,
            skip_task_ids: Vec::new(),
            required_tools: Vec::new(),
        }
    }
}

/// [llm] 段：后端选择（model_selection）、超时与重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / deepseek / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    /// 答案抽取使用的模型，未设置时与推理模型相同
    pub extractor_model: Option<String>,
    pub timeouts: LlmTimeoutsSection,
    pub retry: LlmRetrySection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            temperature: 0.0,
            extractor_model: None,
            timeouts: LlmTimeoutsSection::default(),
            retry: LlmRetrySection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [llm.retry] 段：仅作用于补全能力本身，状态机不做重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmRetrySection {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for LlmRetrySection {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
        }
    }
}

/// [answer] 段：精确匹配评分策略
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnswerSection {
    /// 评分是否大小写不敏感；为 true 时文本答案统一转小写
    pub case_insensitive: bool,
    /// 是否在格式化前调用抽取模型提炼最终答案
    pub use_extractor: bool,
    pub fallback_text: String,
}

impl Default for AnswerSection {
    fn default() -> Self {
        Self {
            case_insensitive: false,
            use_extractor: true,
            fallback_text: crate::react::FALLBACK_ANSWER.to_string(),
        }
    }
}

/// [tools] 段：工具超时、结果截断、Python 解释器与附件目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    pub max_result_chars: usize,
    pub python_bin: String,
    /// 任务附件下载目录，未设置时用系统临时目录下的 gaia-task-files
    pub files_dir: Option<PathBuf>,
    pub search: SearchSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            max_result_chars: 8000,
            python_bin: "python3".to_string(),
            files_dir: None,
            search: SearchSection::default(),
        }
    }
}

impl ToolsSection {
    pub fn files_dir(&self) -> PathBuf {
        self.files_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("gaia-task-files"))
    }
}

/// [tools.search] 段：检索超时、返回文档数、fetch_url 域名白名单（空表示不限制）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub timeout_secs: u64,
    pub max_documents: usize,
    pub allowed_domains: Vec<String>,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_documents: 2,
            allowed_domains: Vec::new(),
        }
    }
}

/// [api] 段：题目附件下载服务
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
    pub file_timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: "https://agents-course-unit4-scoring.hf.space".to_string(),
            file_timeout_secs: 15,
        }
    }
}

/// 从 config 目录加载配置，环境变量 GAIA__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 GAIA__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignoring");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("GAIA")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

static GLOBAL: OnceLock<AppConfig> = OnceLock::new();

/// 将配置固化为进程级只读状态；重复调用时保留首次安装的配置
pub fn install(cfg: AppConfig) -> &'static AppConfig {
    if GLOBAL.get().is_some() {
        tracing::warn!("config already installed, keeping the first one");
    }
    GLOBAL.get_or_init(|| cfg)
}
