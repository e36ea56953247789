//! Agent 构建器：统一的编排器初始化逻辑
//!
//! 由 AppConfig 组装 LLM、工具注册表、推理步、格式化步、可选的答案抽取步与附件来源；
//! CLI 的 ask / batch 与测试共用同一套组装流程。必需工具缺失时 build 失败。

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::core::{AgentError, Orchestrator, RunLimits};
use crate::llm::{
    create_deepseek_client, deepseek_api_key, resolve_deepseek_model, LlmClient, MockLlmClient,
    OpenAiClient, RetryConfig, RetryingLlmClient,
};
use crate::react::{AnswerExtractor, AnswerFormatter, ReasoningStep, DEFAULT_SYSTEM_PROMPT};
use crate::tools::{
    ArxivSearchTool, ClassifyPlantPartsTool, CommutativityTool, FetchUrlTool, HttpTaskFileFetcher, NoFileFetcher,
    ReadFileTool, RunPythonTool, SumSelectedItemsTool, TaskFileFetcher, ToolExecutor,
    ToolRegistry, WebSearchTool, WikiSearchTool,
};

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|k| !k.trim().is_empty())
}

/// 根据配置与环境变量选择 LLM 后端（OpenAI 兼容 / DeepSeek / Mock）；model 为本次使用的模型名
pub fn create_llm_from_config(cfg: &AppConfig, model: &str) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let timeout = cfg.llm.timeouts.request;
    let temperature = cfg.llm.temperature;

    let client: Arc<dyn LlmClient> = match provider.as_str() {
        "mock" => {
            tracing::info!("Using Mock LLM");
            return Arc::new(MockLlmClient::new());
        }
        "deepseek" => {
            let Some(api_key) = deepseek_api_key() else {
                tracing::warn!("DEEPSEEK_API_KEY not set, using Mock LLM");
                return Arc::new(MockLlmClient::new());
            };
            let model = resolve_deepseek_model(model);
            tracing::info!("Using DeepSeek LLM ({})", model);
            Arc::new(
                create_deepseek_client(&model, &api_key)
                    .with_temperature(temperature)
                    .with_timeout(timeout),
            )
        }
        "openai" => {
            let Some(api_key) = env_key("OPENAI_API_KEY") else {
                tracing::warn!("OPENAI_API_KEY not set, using Mock LLM");
                return Arc::new(MockLlmClient::new());
            };
            tracing::info!("Using OpenAI LLM ({})", model);
            Arc::new(
                OpenAiClient::new(cfg.llm.base_url.as_deref(), model, Some(api_key.as_str()))
                    .with_temperature(temperature)
                    .with_timeout(timeout),
            )
        }
        other => {
            tracing::warn!(provider = %other, "unknown provider, using Mock LLM");
            return Arc::new(MockLlmClient::new());
        }
    };

    if cfg.llm.retry.max_retries == 0 {
        return client;
    }
    Arc::new(RetryingLlmClient::new(
        client,
        RetryConfig {
            max_retries: cfg.llm.retry.max_retries,
            base_delay_ms: cfg.llm.retry.base_delay_ms,
        },
    ))
}

/// Agent 构建器：统一配置和初始化编排器的各个组件
pub struct AgentBuilder {
    config: AppConfig,
    llm: Option<Arc<dyn LlmClient>>,
    extractor_llm: Option<Arc<dyn LlmClient>>,
    registry: Option<ToolRegistry>,
    files: Option<Arc<dyn TaskFileFetcher>>,
}

impl AgentBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            llm: None,
            extractor_llm: None,
            registry: None,
            files: None,
        }
    }

    /// 使用外部传入的推理 LLM（不再按配置创建）
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// 使用外部传入的抽取 LLM；仅在 answer.use_extractor 为 true 时生效
    pub fn with_extractor_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.extractor_llm = Some(llm);
        self
    }

    /// 使用外部传入的工具注册表（替代内置工具）
    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_file_fetcher(mut self, files: Arc<dyn TaskFileFetcher>) -> Self {
        self.files = Some(files);
        self
    }

    /// 内置工具注册表；web_search 仅在设置 TAVILY_API_KEY 时注册
    pub fn build_tool_registry(&self) -> Result<ToolRegistry, AgentError> {
        let tools_cfg = &self.config.tools;
        let search = &tools_cfg.search;
        let files_dir = tools_cfg.files_dir();

        let mut tools = ToolRegistry::new();
        let register = |result: Result<(), crate::tools::ToolError>| {
            result.map_err(|e| AgentError::ConfigError(e.to_string()))
        };
        register(tools.register(WikiSearchTool::new(search.timeout_secs, search.max_documents)))?;
        register(tools.register(ArxivSearchTool::new(search.timeout_secs, search.max_documents)))?;
        if let Some(web) = WebSearchTool::from_env(search.timeout_secs) {
            register(tools.register(web))?;
        } else {
            tracing::debug!("TAVILY_API_KEY not set, web_search disabled");
        }
        register(tools.register(FetchUrlTool::new(
            search.allowed_domains.clone(),
            search.timeout_secs,
        )))?;
        register(tools.register(ReadFileTool::new(&files_dir)))?;
        register(tools.register(RunPythonTool::new(
            &files_dir,
            tools_cfg.python_bin.clone(),
            tools_cfg.tool_timeout_secs,
        )))?;
        register(tools.register(CommutativityTool))?;
        register(tools.register(SumSelectedItemsTool))?;
        register(tools.register(ClassifyPlantPartsTool))?;
        Ok(tools)
    }

    fn build_file_fetcher(&self) -> Arc<dyn TaskFileFetcher> {
        let api = &self.config.api;
        if api.base_url.trim().is_empty() {
            return Arc::new(NoFileFetcher);
        }
        Arc::new(HttpTaskFileFetcher::new(
            api.base_url.clone(),
            self.config.tools.files_dir(),
            api.file_timeout_secs,
        ))
    }

    fn build_extractor(&self) -> Option<AnswerExtractor> {
        if !self.config.answer.use_extractor {
            return None;
        }
        if let Some(llm) = &self.extractor_llm {
            return Some(AnswerExtractor::new(llm.clone()));
        }
        // 外部注入推理 LLM（测试）或使用 mock 后端时，不自动创建抽取模型
        if self.llm.is_some() || self.config.llm.provider.eq_ignore_ascii_case("mock") {
            return None;
        }
        let model = self
            .config
            .llm
            .extractor_model
            .clone()
            .unwrap_or_else(|| self.config.llm.model.clone());
        Some(AnswerExtractor::new(create_llm_from_config(&self.config, &model)))
    }

    pub fn build(mut self) -> Result<Orchestrator, AgentError> {
        if self.config.agent.max_iterations == 0 || self.config.agent.max_tool_calls == 0 {
            return Err(AgentError::ConfigError(
                "max_iterations and max_tool_calls must be positive".to_string(),
            ));
        }

        let registry = match self.registry.take() {
            Some(registry) => registry,
            None => self.build_tool_registry()?,
        };
        let extractor = self.build_extractor();
        let files = self.files.clone().unwrap_or_else(|| self.build_file_fetcher());
        let llm = self
            .llm
            .clone()
            .unwrap_or_else(|| create_llm_from_config(&self.config, &self.config.llm.model));
        let config = self.config;

        registry
            .ensure_registered(&config.agent.required_tools)
            .map_err(|e| AgentError::ConfigError(format!("required tool missing: {e}")))?;
        tracing::info!(tools = ?registry.tool_names(), "tool registry ready");

        let executor = ToolExecutor::new(registry, config.tools.tool_timeout_secs)
            .with_max_result_chars(config.tools.max_result_chars);
        let reasoning = ReasoningStep::new(llm, DEFAULT_SYSTEM_PROMPT, executor.schemas());
        let formatter = AnswerFormatter::new(
            config.answer.case_insensitive,
            config.answer.fallback_text.clone(),
        );

        let mut orchestrator = Orchestrator::new(reasoning, executor, formatter)
            .with_limits(RunLimits {
                max_iterations: config.agent.max_iterations,
                max_tool_calls: config.agent.max_tool_calls,
            })
            .with_file_fetcher(files)
            .with_skip_task_ids(config.agent.skip_task_ids.clone())
            .with_run_timeout(config.agent.run_timeout_secs.map(Duration::from_secs));
        if let Some(extractor) = extractor {
            orchestrator = orchestrator.with_extractor(extractor);
        }
        Ok(orchestrator)
    }
}
