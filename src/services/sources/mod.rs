//! 数据源 - 业务能力层
//!
//! 每个数据源只做一件事：`scrape()` 返回一批 Item。
//! 数据源从不返回 `Err`，失败体现在 `ScrapeResult::success` 上。

pub mod arxiv;
pub mod github;
pub mod huggingface;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::SourceError;
use crate::models::ScrapeResult;

pub use arxiv::ArxivDomainSource;
pub use github::GitHubTrendingSource;
pub use huggingface::HuggingFacePapersSource;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// 数据源
#[async_trait]
pub trait Source: Send + Sync {
    /// 数据源名称，同时作为 Item 的 `source`
    fn name(&self) -> &str;

    /// 抓取一批 Item
    async fn scrape(&self) -> ScrapeResult;
}

/// 数据源共用的 HTTP 客户端
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// GET 文本内容，非 2xx 视为失败
pub async fn fetch_text(client: &reqwest::Client, endpoint: &str) -> Result<String, SourceError> {
    debug!("🌐 GET {}", endpoint);
    let response = client
        .get(endpoint)
        .send()
        .await
        .map_err(|source| SourceError::RequestFailed {
            endpoint: endpoint.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::BadStatus {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        });
    }

    response
        .text()
        .await
        .map_err(|source| SourceError::RequestFailed {
            endpoint: endpoint.to_string(),
            source,
        })
}

/// 把换行、制表符和连续空白合并为单个空格
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
