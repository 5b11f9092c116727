//! GitHub Trending
//!
//! 先抓全站榜，再逐个抓语言榜；语言榜失败只记日志，全站榜失败才算整体失败。

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use tracing::{error, info, warn};

use super::{collapse_whitespace, fetch_text, http_client, Source};
use crate::config::Config;
use crate::models::{keys, Item, ScrapeResult};

const TRENDING_URL: &str = "https://github.com/trending";
const SITE_ROOT: &str = "https://github.com";
const GLOBAL_SCOPE: &str = "global";
const PAGE_PAUSE: Duration = Duration::from_secs(1);

static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("article.Box-row").unwrap());
static REPO_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2 > a").unwrap());
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static LANGUAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[itemprop="programmingLanguage"]"#).unwrap());
static STARS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href$="/stargazers"]"#).unwrap());
static FORKS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a[href$="/network/members"], a[href$="/forks"]"#).unwrap()
});

/// GitHub Trending 榜单
pub struct GitHubTrendingSource {
    client: reqwest::Client,
    languages: Vec<String>,
    time_range: String,
    max_items: usize,
}

impl GitHubTrendingSource {
    pub const NAME: &'static str = "GitHub Trending";

    pub fn new(config: &Config) -> Self {
        Self {
            client: http_client(),
            languages: config.github_languages.clone(),
            time_range: config.github_time_range.clone(),
            max_items: config.github_max_items,
        }
    }

    /// 榜单地址：语言为空时是全站榜，daily 不带查询参数
    pub fn trending_url(&self, language: Option<&str>) -> String {
        let mut url = TRENDING_URL.to_string();
        if let Some(language) = language.map(str::trim).filter(|l| !l.is_empty()) {
            url.push('/');
            url.push_str(language);
        }
        if self.time_range != "daily" {
            url.push_str("?since=");
            url.push_str(&self.time_range);
        }
        url
    }

    /// 解析榜单页，`scope` 写入每条数据的 `trendingScope`
    pub fn parse_page(&self, html: &str, scope: &str, now: DateTime<Utc>) -> Vec<Item> {
        let document = Html::parse_document(html);
        let millis = now.timestamp_millis();

        document
            .select(&ROW)
            .enumerate()
            .filter_map(|(index, row)| {
                let link = row.select(&REPO_LINK).next()?;
                let full_name: String = link
                    .text()
                    .collect::<String>()
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                let (owner, name) = full_name.split_once('/')?;
                if owner.is_empty() || name.is_empty() {
                    return None;
                }
                let href = link.value().attr("href").map(str::trim).filter(|h| !h.is_empty())?;

                let description = first_text(row, &PARAGRAPH);
                let language = first_text(row, &LANGUAGE).unwrap_or_else(|| "N/A".to_string());

                let mut item = Item::new(
                    format!("github-{}-{}-{}", scope, index, millis),
                    format!("{}/{}", owner, name),
                    Self::NAME,
                )
                .with_url(format!("{}{}", SITE_ROOT, href))
                .with_meta(keys::OWNER, owner)
                .with_meta(keys::REPO_NAME, name)
                .with_meta(keys::LANGUAGE, language)
                .with_meta(keys::STARS, count_of(row, &STARS))
                .with_meta(keys::FORKS, count_of(row, &FORKS))
                .with_meta(keys::RANK, index + 1)
                .with_meta(keys::TRENDING_SCOPE, scope);
                item.timestamp = now;
                if let Some(description) = description {
                    item = item.with_description(description);
                }
                Some(item)
            })
            .take(self.max_items)
            .collect()
    }
}

fn first_text(row: ElementRef, selector: &Selector) -> Option<String> {
    row.select(selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|text| !text.is_empty())
}

/// `1,234` → 1234，无法解析时为 0
fn count_of(row: ElementRef, selector: &Selector) -> u64 {
    first_text(row, selector)
        .map(|text| text.chars().filter(char::is_ascii_digit).collect::<String>())
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl Source for GitHubTrendingSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn scrape(&self) -> ScrapeResult {
        info!("📥 开始抓取 {}...", Self::NAME);
        let now = Utc::now();

        let global_url = self.trending_url(None);
        let mut items = match fetch_text(&self.client, &global_url).await {
            Ok(html) => self.parse_page(&html, GLOBAL_SCOPE, now),
            Err(e) => {
                error!("❌ 抓取 {} 失败: {}", Self::NAME, e);
                return ScrapeResult::failed(Self::NAME, e.to_string());
            }
        };

        for language in &self.languages {
            tokio::time::sleep(PAGE_PAUSE).await;
            let url = self.trending_url(Some(language));
            match fetch_text(&self.client, &url).await {
                Ok(html) => {
                    let page = self.parse_page(&html, language, now);
                    info!("  {} 语言榜 {} 条", language, page.len());
                    items.extend(page);
                }
                Err(e) => warn!("⚠️ 抓取 {} 语言榜失败（已跳过）: {}", language, e),
            }
        }

        info!("✅ 成功抓取 {}，共 {} 条数据", Self::NAME, items.len());
        ScrapeResult::ok(Self::NAME, items)
    }
}
