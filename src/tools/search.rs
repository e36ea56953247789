//! 搜索工具：Wikipedia、arXiv 与 Tavily
//!
//! 三者输出相同的 Document 块格式（source + 正文，块之间以 `---` 分隔），便于模型引用来源。

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Url};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::schema::args_schema;
use crate::tools::Tool;

const WIKI_API: &str = "https://en.wikipedia.org/w/api.php";
const ARXIV_API: &str = "http://export.arxiv.org/api/query";
const TAVILY_API: &str = "https://api.tavily.com/search";

#[derive(Deserialize, JsonSchema)]
struct QueryArgs {
    /// 搜索关键词
    query: String,
}

/// 一条检索结果
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub source: String,
    pub content: String,
}

pub(crate) fn format_documents(docs: &[Document]) -> String {
    docs.iter()
        .map(|doc| format!("<Document source=\"{}\" page=\"\"/>\n{}\n</Document>", doc.source, doc.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent("gaia-agent/0.1 (benchmark research bot)")
        .build()
        .unwrap_or_default()
}

fn parse_query(args: Value) -> Result<String, String> {
    let args: QueryArgs = serde_json::from_value(args).map_err(|e| e.to_string())?;
    let query = args.query.trim().to_string();
    if query.is_empty() {
        return Err("Missing query".to_string());
    }
    Ok(query)
}

// ---- Wikipedia ----

#[derive(Deserialize)]
struct WikiSearchResponse {
    query: Option<WikiSearchQuery>,
}

#[derive(Deserialize)]
struct WikiSearchQuery {
    #[serde(default)]
    search: Vec<WikiHit>,
}

#[derive(Deserialize)]
struct WikiHit {
    title: String,
}

#[derive(Deserialize)]
struct WikiExtractResponse {
    query: Option<WikiPages>,
}

#[derive(Deserialize)]
struct WikiPages {
    #[serde(default)]
    pages: std::collections::HashMap<String, WikiPage>,
}

#[derive(Deserialize)]
struct WikiPage {
    #[serde(default)]
    extract: String,
}

/// wiki_search：按关键词搜索英文维基百科，返回前 max_documents 篇正文
pub struct WikiSearchTool {
    client: Client,
    max_documents: usize,
}

impl WikiSearchTool {
    pub fn new(timeout_secs: u64, max_documents: usize) -> Self {
        Self {
            client: http_client(timeout_secs),
            max_documents: max_documents.max(1),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, params: &[(&str, &str)]) -> Result<T, String> {
        let url = Url::parse_with_params(WIKI_API, params).map_err(|e| e.to_string())?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        resp.json::<T>().await.map_err(|e| format!("Invalid response: {}", e))
    }

    async fn search(&self, query: &str) -> Result<Vec<Document>, String> {
        let limit = self.max_documents.to_string();
        let found: WikiSearchResponse = self
            .get_json(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", &limit),
                ("format", "json"),
            ])
            .await?;
        let titles: Vec<String> = found
            .query
            .map(|q| q.search.into_iter().map(|hit| hit.title).collect())
            .unwrap_or_default();

        let mut docs = Vec::with_capacity(titles.len());
        for title in titles {
            let page: WikiExtractResponse = self
                .get_json(&[
                    ("action", "query"),
                    ("prop", "extracts"),
                    ("explaintext", "1"),
                    ("redirects", "1"),
                    ("titles", &title),
                    ("format", "json"),
                ])
                .await?;
            let content = page
                .query
                .and_then(|q| q.pages.into_values().next())
                .map(|p| p.extract)
                .unwrap_or_default();
            if content.trim().is_empty() {
                continue;
            }
            docs.push(Document {
                source: format!("https://en.wikipedia.org/wiki/{}", title.replace(' ', "_")),
                content,
            });
        }
        Ok(docs)
    }
}

#[async_trait]
impl Tool for WikiSearchTool {
    fn name(&self) -> &str {
        "wiki_search"
    }

    fn description(&self) -> &str {
        "Search English Wikipedia and return the full text of the best matching articles."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<QueryArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let query = parse_query(args)?;
        tracing::info!(query = %query, "wiki_search");
        let docs = self.search(&query).await?;
        if docs.is_empty() {
            return Ok(Value::String(format!("No Wikipedia results for: {}", query)));
        }
        Ok(Value::String(format_documents(&docs)))
    }
}

// ---- arXiv ----

fn entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<entry>(.*?)</entry>").unwrap())
}

fn atom_field_re(tag: &str) -> Regex {
    Regex::new(&format!(r"(?s)<{tag}(?:\s[^>]*)?>(.*?)</{tag}>")).unwrap()
}

fn atom_fields() -> &'static [(&'static str, Regex); 4] {
    static RE: OnceLock<[(&'static str, Regex); 4]> = OnceLock::new();
    RE.get_or_init(|| {
        ["id", "title", "published", "summary"].map(|tag| (tag, atom_field_re(tag)))
    })
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 解析 arXiv Atom feed：每个 entry 生成一个 Document（摘要页链接 + 标题、发布日期、摘要）
pub(crate) fn parse_arxiv_feed(feed: &str, max_documents: usize) -> Vec<Document> {
    entry_re()
        .captures_iter(feed)
        .filter_map(|entry| {
            let body = &entry[1];
            let field = |name: &str| {
                atom_fields()
                    .iter()
                    .find(|(tag, _)| *tag == name)
                    .and_then(|(_, re)| re.captures(body))
                    .map(|caps| unescape_xml(caps[1].trim()))
                    .unwrap_or_default()
            };
            let source = field("id");
            let summary = squash_whitespace(&field("summary"));
            if source.is_empty() || summary.is_empty() {
                return None;
            }
            let title = squash_whitespace(&field("title"));
            let published: String = field("published").chars().take(10).collect();
            Some(Document {
                source,
                content: format!("Title: {title}\nPublished: {published}\n\n{summary}"),
            })
        })
        .take(max_documents)
        .collect()
}

/// arxiv_search：arXiv export API 检索论文，返回前 max_documents 篇的元数据与摘要
pub struct ArxivSearchTool {
    client: Client,
    max_documents: usize,
}

impl ArxivSearchTool {
    pub fn new(timeout_secs: u64, max_documents: usize) -> Self {
        Self {
            client: http_client(timeout_secs),
            max_documents: max_documents.max(1),
        }
    }
}

#[async_trait]
impl Tool for ArxivSearchTool {
    fn name(&self) -> &str {
        "arxiv_search"
    }

    fn description(&self) -> &str {
        "Search arXiv papers and return titles, publication dates and abstracts of the best matches."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<QueryArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let query = parse_query(args)?;
        tracing::info!(query = %query, "arxiv_search");
        let search_query = format!("all:{}", query);
        let max_results = self.max_documents.to_string();
        let url = Url::parse_with_params(
            ARXIV_API,
            &[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
            ],
        )
        .map_err(|e| e.to_string())?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let feed = resp
            .text()
            .await
            .map_err(|e| format!("Invalid response: {}", e))?;
        let docs = parse_arxiv_feed(&feed, self.max_documents);
        if docs.is_empty() {
            return Ok(Value::String(format!("No arXiv results for: {}", query)));
        }
        Ok(Value::String(format_documents(&docs)))
    }
}

// ---- Tavily ----

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// web_search：Tavily 网页搜索；仅在设置 TAVILY_API_KEY 时注册
pub struct WebSearchTool {
    client: Client,
    api_key: String,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64, max_results: usize) -> Self {
        Self {
            client: http_client(timeout_secs),
            api_key: api_key.into(),
            max_results: max_results.max(1),
        }
    }

    /// 从环境变量 TAVILY_API_KEY 构造
    pub fn from_env(timeout_secs: u64) -> Option<Self> {
        std::env::var("TAVILY_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(|key| Self::new(key, timeout_secs, 3))
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return the top results with their source URLs."
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<QueryArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let query = parse_query(args)?;
        tracing::info!(query = %query, "web_search");
        let resp = self
            .client
            .post(TAVILY_API)
            .bearer_auth(&self.api_key)
            .json(&TavilyRequest {
                api_key: &self.api_key,
                query: &query,
                max_results: self.max_results,
            })
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body: TavilyResponse = resp
            .json()
            .await
            .map_err(|e| format!("Invalid response: {}", e))?;
        let docs: Vec<Document> = body
            .results
            .into_iter()
            .map(|r| Document {
                source: r.url,
                content: r.content,
            })
            .collect();
        if docs.is_empty() {
            return Ok(Value::String(format!("No web results for: {}", query)));
        }
        Ok(Value::String(format_documents(&docs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_documents() {
        let docs = vec![
            Document {
                source: "https://en.wikipedia.org/wiki/Mercedes_Sosa".into(),
                content: "Argentine singer.\n".into(),
            },
            Document {
                source: "https://example.com".into(),
                content: "Second".into(),
            },
        ];
        let text = format_documents(&docs);
        assert!(text.starts_with("<Document source=\"https://en.wikipedia.org/wiki/Mercedes_Sosa\""));
        assert!(text.contains("Argentine singer.\n</Document>\n\n---\n\n<Document"));
    }

    #[test]
    fn test_parse_query_rejects_blank() {
        assert!(parse_query(json!({"query": "   "})).is_err());
        assert_eq!(parse_query(json!({"query": " rust "})).unwrap(), "rust");
    }

    const ARXIV_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:fairness</title>
  <id>http://arxiv.org/api/abc</id>
  <entry>
    <id>http://arxiv.org/abs/2206.00001v1</id>
    <published>2022-06-01T17:59:59Z</published>
    <title>Fairness in
      AI &amp; Society</title>
    <summary>  We study three axes
  of regulation.
    </summary>
    <author><name>A. Author</name></author>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/1608.00002v2</id>
    <published>2016-08-11T00:00:00Z</published>
    <title>Physics and Society</title>
    <summary>Egalitarian societies.</summary>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_arxiv_feed() {
        let docs = parse_arxiv_feed(ARXIV_FEED, 3);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source, "http://arxiv.org/abs/2206.00001v1");
        assert_eq!(
            docs[0].content,
            "Title: Fairness in AI & Society\nPublished: 2022-06-01\n\nWe study three axes of regulation."
        );
        assert!(docs[1].content.starts_with("Title: Physics and Society\nPublished: 2016-08-11"));
    }

    #[test]
    fn test_parse_arxiv_feed_limits_and_skips_empty() {
        assert_eq!(parse_arxiv_feed(ARXIV_FEED, 1).len(), 1);
        assert!(parse_arxiv_feed("<feed><title>empty</title></feed>", 3).is_empty());
        let no_summary = "<entry><id>http://arxiv.org/abs/x</id><title>T</title></entry>";
        assert!(parse_arxiv_feed(no_summary, 3).is_empty());
    }

    #[test]
    fn test_tavily_response_tolerates_missing_fields() {
        let body: TavilyResponse =
            serde_json::from_value(json!({"results": [{"url": "https://a.com"}]})).unwrap();
        assert_eq!(body.results.len(), 1);
        assert!(body.results[0].content.is_empty());
    }
}
