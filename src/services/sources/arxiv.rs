//! arXiv 领域论文
//!
//! 每个领域对应一条固定的 arXiv 检索式，按提交时间倒序取最新若干篇。
//! Atom 响应结构固定，直接用正则提取字段。

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{error, info, warn};

use super::{collapse_whitespace, fetch_text, http_client, Source};
use crate::config::Config;
use crate::error::SourceError;
use crate::models::{keys, Item, ScrapeResult};

const API_BASE: &str = "http://export.arxiv.org/api/query";

static ENTRY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<entry>(.*?)</entry>").unwrap());
static TITLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<title>(.*?)</title>").unwrap());
static SUMMARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<summary>(.*?)</summary>").unwrap());
static ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<id>(.*?)</id>").unwrap());
static PUBLISHED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<published>(.*?)</published>").unwrap());
static UPDATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<updated>(.*?)</updated>").unwrap());
static AUTHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<author>\s*<name>(.*?)</name>").unwrap());
static CATEGORY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<category[^>]*\bterm="([^"]*)""#).unwrap());

/// 领域 → arXiv 检索式
pub fn domain_query(domain: &str) -> Option<&'static str> {
    let query = match domain {
        "NLP" => r#"cat:cs.CL+OR+cat:cs.AI+AND+ti:"natural+language""#,
        "LLM" => r#"cat:cs.CL+AND+(ti:"large+language+model"+OR+ti:"LLM"+OR+ti:"transformer")"#,
        "Agent" => r#"cat:cs.AI+AND+(ti:"agent"+OR+ti:"multi-agent"+OR+ti:"autonomous")"#,
        "AI" => "cat:cs.AI+OR+cat:cs.LG+OR+cat:cs.CL",
        "CV" => {
            r#"cat:cs.CV+OR+(cat:cs.AI+AND+(ti:"computer+vision"+OR+ti:"image+recognition"+OR+ti:"object+detection"+OR+ti:"semantic+segmentation"+OR+ti:"image+classification"))"#
        }
        "Evaluation" => {
            r#"cat:cs.AI+AND+(ti:"evaluation"+OR+ti:"benchmark"+OR+ti:"assessment"+OR+ti:"comparison"+OR+ti:"performance+analysis"+OR+ti:"model+evaluation"+OR+ti:"benchmarking")"#
        }
        "Multimodal" => {
            r#"cat:cs.AI+AND+(ti:"multimodal"+OR+ti:"vision-language"+OR+ti:"text-to-image"+OR+ti:"image-to-text"+OR+ti:"visual+language+model"+OR+ti:"VLM")"#
        }
        "Robotics" => {
            r#"cat:cs.RO+OR+(cat:cs.AI+AND+(ti:"robotics"+OR+ti:"robot"+OR+ti:"autonomous+vehicle"+OR+ti:"control+system"))"#
        }
        _ => return None,
    };
    Some(query)
}

/// arXiv 领域检索
pub struct ArxivDomainSource {
    client: reqwest::Client,
    endpoint: String,
    domains: Vec<String>,
    max_results: usize,
    interpretation_base_url: String,
}

impl ArxivDomainSource {
    pub const NAME: &'static str = "ArXiv Domain";

    pub fn new(config: &Config) -> Self {
        // 去重，保留首次出现的顺序
        let mut domains: Vec<String> = Vec::new();
        for domain in &config.arxiv_domains {
            if !domains.contains(domain) {
                domains.push(domain.clone());
            }
        }

        Self {
            client: http_client(),
            endpoint: API_BASE.to_string(),
            domains,
            max_results: config.arxiv_max_results,
            interpretation_base_url: config.interpretation_base_url.clone(),
        }
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn query_url(&self, query: &str) -> String {
        format!(
            "{}?search_query={}&start=0&max_results={}&sortBy=submittedDate&sortOrder=descending",
            self.endpoint, query, self.max_results
        )
    }

    /// 解析 Atom 响应，标题或 ID 缺失的条目被丢弃
    pub fn parse_feed(&self, xml: &str, domain: &str, now: DateTime<Utc>) -> Vec<Item> {
        let millis = now.timestamp_millis();
        let mut items = Vec::new();

        for caps in ENTRY.captures_iter(xml) {
            let entry = &caps[1];
            let title = capture_text(&TITLE, entry);
            let arxiv_id = capture_text(&ID, entry)
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string();
            if title.is_empty() || arxiv_id.is_empty() {
                continue;
            }

            let summary = capture_text(&SUMMARY, entry);
            let published = capture_text(&PUBLISHED, entry);
            let updated = capture_text(&UPDATED, entry);
            let authors: Vec<String> = AUTHOR
                .captures_iter(entry)
                .map(|c| decode_entities(&collapse_whitespace(&c[1])))
                .filter(|name| !name.is_empty())
                .collect();
            let categories: Vec<String> = CATEGORY
                .captures_iter(entry)
                .map(|c| c[1].to_string())
                .filter(|term| !term.is_empty())
                .collect();

            let rank = items.len() + 1;
            let abs_url = format!("https://arxiv.org/abs/{}", arxiv_id);
            let mut item = Item::new(format!("arxiv-{}-{}", arxiv_id, millis), title, Self::NAME)
                .with_url(abs_url.clone())
                .with_meta(keys::ARXIV_ID, arxiv_id.clone())
                .with_meta(keys::ARXIV_URL, abs_url)
                .with_meta(keys::PDF_URL, format!("https://arxiv.org/pdf/{}.pdf", arxiv_id))
                .with_meta(
                    keys::COOL_PAPER_URL,
                    format!("{}{}", self.interpretation_base_url, arxiv_id),
                )
                .with_meta(keys::AUTHORS, authors.join(", "))
                .with_meta(keys::CATEGORIES, categories.join(", "))
                .with_meta(keys::PUBLISHED, published.clone())
                .with_meta(keys::UPDATED, updated)
                .with_meta(keys::DOMAIN, domain)
                .with_meta(keys::RANK, rank);
            if !summary.is_empty() {
                item = item.with_description(summary);
            }
            item.timestamp = DateTime::parse_from_rfc3339(&published)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or(now);
            items.push(item);
        }

        items
    }

    async fn scrape_domain(&self, domain: &str) -> Result<Vec<Item>, SourceError> {
        let query = domain_query(domain).ok_or_else(|| SourceError::ParseFailed {
            endpoint: self.endpoint.clone(),
            reason: format!("未知领域: {}", domain),
        })?;
        let xml = fetch_text(&self.client, &self.query_url(query)).await?;
        Ok(self.parse_feed(&xml, domain, Utc::now()))
    }
}

fn capture_text(re: &Regex, text: &str) -> String {
    re.captures(text)
        .map(|c| decode_entities(&collapse_whitespace(&c[1])))
        .unwrap_or_default()
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[async_trait]
impl Source for ArxivDomainSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    /// 逐个领域抓取，单个领域失败只记录日志；全部失败才算失败
    async fn scrape(&self) -> ScrapeResult {
        info!("📥 开始抓取 {}，领域: {:?}", Self::NAME, self.domains);

        let mut items = Vec::new();
        let mut errors = Vec::new();
        let mut succeeded = 0;
        for domain in &self.domains {
            match self.scrape_domain(domain).await {
                Ok(domain_items) => {
                    info!("✓ 领域 {} 抓取 {} 篇", domain, domain_items.len());
                    succeeded += 1;
                    items.extend(domain_items);
                }
                Err(e) => {
                    warn!("⚠️ 领域 {} 抓取失败，跳过: {}", domain, e);
                    errors.push(format!("{}: {}", domain, e));
                }
            }
        }

        if succeeded == 0 && !errors.is_empty() {
            error!("❌ 抓取 {} 失败: 所有领域均失败", Self::NAME);
            return ScrapeResult::failed(Self::NAME, errors.join("; "));
        }

        info!("✅ 成功抓取 {}，共 {} 条数据", Self::NAME, items.len());
        ScrapeResult::ok(Self::NAME, items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query</title>
  <entry>
    <id>http://arxiv.org/abs/2401.00001v1</id>
    <updated>2024-01-02T00:00:00Z</updated>
    <published>2024-01-01T12:00:00Z</published>
    <title>Agents &amp; Tools:
      A Survey</title>
    <summary>  We survey
      agents.  </summary>
    <author><name>Alice</name></author>
    <author>
      <name>Bob</name>
    </author>
    <category term="cs.AI" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2401.00002v1</id>
    <title>   </title>
  </entry>
</feed>"#;

    fn source() -> ArxivDomainSource {
        ArxivDomainSource::new(&Config::default())
    }

    #[test]
    fn test_parse_feed() {
        let items = source().parse_feed(FEED, "Agent", Utc::now());
        assert_eq!(items.len(), 1);

        let item = &items[0];
        assert_eq!(item.title, "Agents & Tools: A Survey");
        assert_eq!(item.description.as_deref(), Some("We survey agents."));
        assert_eq!(item.source, "ArXiv Domain");
        assert_eq!(item.url.as_deref(), Some("https://arxiv.org/abs/2401.00001v1"));
        assert_eq!(item.meta_str(keys::ARXIV_ID).as_deref(), Some("2401.00001v1"));
        assert_eq!(item.meta_str(keys::AUTHORS).as_deref(), Some("Alice, Bob"));
        assert_eq!(item.meta_str(keys::CATEGORIES).as_deref(), Some("cs.AI, cs.CL"));
        assert_eq!(item.meta_str(keys::DOMAIN).as_deref(), Some("Agent"));
        assert_eq!(item.meta_str(keys::RANK).as_deref(), Some("1"));
        assert_eq!(item.timestamp.to_rfc3339(), "2024-01-01T12:00:00+00:00");
    }

    #[test]
    fn test_domains_deduplicated() {
        let config = Config {
            arxiv_domains: vec!["LLM".into(), "LLM".into(), "NLP".into()],
            ..Config::default()
        };
        let source = ArxivDomainSource::new(&config);
        assert_eq!(source.domains().to_vec(), vec!["LLM".to_string(), "NLP".to_string()]);
    }

    #[test]
    fn test_domain_queries() {
        for domain in ["NLP", "LLM", "Agent", "AI", "CV", "Evaluation", "Multimodal", "Robotics"] {
            assert!(domain_query(domain).is_some(), "{}", domain);
        }
        assert!(domain_query("Biology").is_none());
    }

    #[test]
    fn test_query_url() {
        let url = source().query_url("cat:cs.AI");
        assert!(url.starts_with("http://export.arxiv.org/api/query?search_query=cat:cs.AI"));
        assert!(url.contains("max_results=10"));
        assert!(url.contains("sortBy=submittedDate"));
    }

    #[tokio::test]
    async fn test_unknown_domains_fail_scrape() {
        let config = Config {
            arxiv_domains: vec!["Biology".into()],
            ..Config::default()
        };
        let result = ArxivDomainSource::new(&config).scrape().await;
        assert!(!result.success);
        assert!(result.error.unwrap_or_default().contains("Biology"));
    }

    #[tokio::test]
    #[ignore]
    async fn test_scrape_live() {
        let _ = tracing_subscriber::fmt::try_init();
        let result = source().scrape().await;
        println!("{} items", result.items.len());
        assert!(result.success, "{:?}", result.error);
    }
}
