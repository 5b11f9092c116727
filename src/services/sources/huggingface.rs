//! HuggingFace 每日论文

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use tracing::{error, info};

use super::{collapse_whitespace, fetch_text, http_client, Source};
use crate::config::Config;
use crate::models::{keys, Item, ScrapeResult};

const PAPERS_URL: &str = "https://huggingface.co/papers";
const SITE_ROOT: &str = "https://huggingface.co";

static ARTICLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("article").unwrap());
static TITLE_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3 a").unwrap());
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());

/// HuggingFace Papers 列表页
pub struct HuggingFacePapersSource {
    client: reqwest::Client,
    endpoint: String,
    max_items: usize,
    interpretation_base_url: String,
}

impl HuggingFacePapersSource {
    pub const NAME: &'static str = "HuggingFace Papers";

    pub fn new(config: &Config) -> Self {
        Self {
            client: http_client(),
            endpoint: PAPERS_URL.to_string(),
            max_items: config.hf_max_items,
            interpretation_base_url: config.interpretation_base_url.clone(),
        }
    }

    /// 解析列表页，最多返回 `max_items` 条
    pub fn parse_page(&self, html: &str, now: DateTime<Utc>) -> Vec<Item> {
        let document = Html::parse_document(html);
        let millis = now.timestamp_millis();

        document
            .select(&ARTICLE)
            .enumerate()
            .filter_map(|(index, article)| {
                let link = article.select(&TITLE_LINK).next()?;
                let title = collapse_whitespace(&link.text().collect::<String>());
                if title.is_empty() {
                    return None;
                }

                let description = article
                    .select(&PARAGRAPH)
                    .next()
                    .map(|p| collapse_whitespace(&p.text().collect::<String>()))
                    .filter(|d| !d.is_empty());
                let href = link.value().attr("href").unwrap_or_default();

                let mut item = Item::new(format!("hf-{}-{}", index, millis), title, Self::NAME)
                    .with_meta(keys::RANK, index + 1);
                item.timestamp = now;
                if let Some(description) = description {
                    item = item.with_description(description);
                }
                if !href.is_empty() {
                    item = item.with_url(absolute_url(href));
                }
                if let Some(arxiv_id) = paper_id_from_href(href) {
                    item = item
                        .with_meta(keys::ARXIV_ID, arxiv_id.clone())
                        .with_meta(keys::ARXIV_URL, format!("https://arxiv.org/abs/{}", arxiv_id))
                        .with_meta(keys::PDF_URL, format!("https://arxiv.org/pdf/{}.pdf", arxiv_id))
                        .with_meta(
                            keys::COOL_PAPER_URL,
                            format!("{}{}", self.interpretation_base_url, arxiv_id),
                        );
                }
                Some(item)
            })
            .take(self.max_items)
            .collect()
    }
}

fn absolute_url(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{}{}", SITE_ROOT, href)
    }
}

/// `/papers/2401.00001` → `2401.00001`
fn paper_id_from_href(href: &str) -> Option<String> {
    let id = href
        .split(['?', '#'])
        .next()?
        .trim_end_matches('/')
        .rsplit('/')
        .next()?;
    if id.is_empty() || id == "papers" {
        None
    } else {
        Some(id.to_string())
    }
}

#[async_trait]
impl Source for HuggingFacePapersSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn scrape(&self) -> ScrapeResult {
        info!("📥 开始抓取 {}...", Self::NAME);
        match fetch_text(&self.client, &self.endpoint).await {
            Ok(html) => {
                let items = self.parse_page(&html, Utc::now());
                info!("✅ 成功抓取 {}，共 {} 条数据", Self::NAME, items.len());
                ScrapeResult::ok(Self::NAME, items)
            }
            Err(e) => {
                error!("❌ 抓取 {} 失败: {}", Self::NAME, e);
                ScrapeResult::failed(Self::NAME, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(max_items: usize) -> HuggingFacePapersSource {
        let config = Config {
            hf_max_items: max_items,
            ..Config::default()
        };
        HuggingFacePapersSource::new(&config)
    }

    const PAGE: &str = r#"
        <html><body>
        <article>
          <h3><a href="/papers/2401.00001">Scaling
             Laws   for Agents</a></h3>
          <p>We study
             scaling.</p>
        </article>
        <article><h3><a href="/papers/x">   </a></h3></article>
        <article>
          <h3><a href="/papers/2402.00002">Second Paper</a></h3>
        </article>
        </body></html>"#;

    #[test]
    fn test_parse_page_items() {
        let items = source(20).parse_page(PAGE, Utc::now());
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.title, "Scaling Laws for Agents");
        assert_eq!(first.description.as_deref(), Some("We study scaling."));
        assert_eq!(first.url.as_deref(), Some("https://huggingface.co/papers/2401.00001"));
        assert_eq!(first.source, "HuggingFace Papers");
        assert!(first.id.starts_with("hf-0-"));
        assert_eq!(first.meta_str(keys::ARXIV_ID).as_deref(), Some("2401.00001"));
        assert_eq!(
            first.meta_str(keys::PDF_URL).as_deref(),
            Some("https://arxiv.org/pdf/2401.00001.pdf")
        );
        assert_eq!(
            first.meta_str(keys::COOL_PAPER_URL).as_deref(),
            Some("https://papers.cool/arxiv/2401.00001")
        );

        // 排名按页面上的文章位置计算
        assert_eq!(items[1].meta_str(keys::RANK).as_deref(), Some("3"));
        assert!(items[1].description.is_none());
    }

    #[test]
    fn test_parse_page_respects_limit() {
        let items = source(1).parse_page(PAGE, Utc::now());
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_paper_id_from_href() {
        assert_eq!(paper_id_from_href("/papers/2401.00001").as_deref(), Some("2401.00001"));
        assert_eq!(paper_id_from_href("/papers/2401.00001/?x=1").as_deref(), Some("2401.00001"));
        assert_eq!(paper_id_from_href("/papers"), None);
        assert_eq!(paper_id_from_href(""), None);
    }

    #[tokio::test]
    #[ignore]
    async fn test_scrape_live() {
        let _ = tracing_subscriber::fmt::try_init();
        let result = source(5).scrape().await;
        println!("{:#?}", result.items.first());
        assert!(result.success, "{:?}", result.error);
    }
}
