//! fetch_url：抓取网页并提取可读文本
//!
//! 可选域名白名单（为空表示不限制）；GET 带超时与浏览器 User-Agent；
//! HTML 响应经 html2text 转为纯文本，失败时回退为简单去标签。截断由 ToolExecutor 统一处理。

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::schema::args_schema;
use crate::tools::Tool;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

#[derive(Deserialize, JsonSchema)]
struct FetchUrlArgs {
    /// 完整 URL（http:// 或 https://）
    url: String,
}

pub struct FetchUrlTool {
    client: Client,
    allowed_domains: HashSet<String>,
}

impl FetchUrlTool {
    pub fn new(allowed_domains: Vec<String>, timeout_secs: u64) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .unwrap_or_default();
        Self {
            client,
            allowed_domains: allowed_domains.into_iter().map(|d| d.to_lowercase()).collect(),
        }
    }

    fn check_allowed(&self, url: &str) -> Result<(), String> {
        let domain = extract_domain(url).ok_or_else(|| "Invalid or missing URL".to_string())?;
        if self.allowed_domains.is_empty()
            || self
                .allowed_domains
                .iter()
                .any(|d| domain == *d || domain.ends_with(&format!(".{d}")))
        {
            return Ok(());
        }
        Err(format!("Domain not in allowlist: {}", domain))
    }

    async fn fetch(&self, url: &str) -> Result<String, String> {
        self.check_allowed(url)?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp.text().await.map_err(|e| format!("Read body: {}", e))?;
        let body = body.trim_start_matches('\u{FEFF}');
        if looks_like_html(body) {
            Ok(html_to_text(body))
        } else {
            Ok(body.to_string())
        }
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its readable text. Use it to read a page found by a search."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<FetchUrlArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: FetchUrlArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
        let url = args.url.trim();
        if url.is_empty() {
            return Err("Missing url".to_string());
        }
        tracing::info!(url = %url, "fetch_url");
        self.fetch(url).await.map(Value::String)
    }
}

/// HTML → 可读文本；html2text 失败或结果为空时去标签
pub(crate) fn html_to_text(html: &str) -> String {
    match from_read(html.as_bytes(), 120) {
        Ok(text) if !text.trim().is_empty() => text,
        _ => strip_html_tags(html),
    }
}

fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    let head = s.get(..s.len().min(512)).unwrap_or(s).to_ascii_lowercase();
    head.starts_with("<!") || head.starts_with("<html") || head.contains("<head") || head.contains("<body")
}

fn extract_domain(url: &str) -> Option<String> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.rsplit('@').next()?.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://en.wikipedia.org/wiki/Rust").as_deref(),
            Some("en.wikipedia.org")
        );
        assert_eq!(extract_domain("http://a.com:8080?x=1").as_deref(), Some("a.com"));
        assert_eq!(extract_domain("ftp://a.com"), None);
    }

    #[test]
    fn test_allowlist_matches_subdomains() {
        let tool = FetchUrlTool::new(vec!["wikipedia.org".into()], 5);
        assert!(tool.check_allowed("https://en.wikipedia.org/wiki/X").is_ok());
        assert!(tool.check_allowed("https://example.com").is_err());

        let open = FetchUrlTool::new(vec![], 5);
        assert!(open.check_allowed("https://example.com").is_ok());
    }

    #[test]
    fn test_html_to_text_drops_tags() {
        let text = html_to_text("<html><body><p>Hello <b>world</b></p></body></html>");
        assert!(text.contains("Hello"));
        assert!(text.contains("world"));
        assert!(!text.contains("<p>"));
    }

    #[tokio::test]
    async fn test_missing_url() {
        let tool = FetchUrlTool::new(vec![], 5);
        assert!(tool.execute(json!({"url": "  "})).await.is_err());
    }
}
