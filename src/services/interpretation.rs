//! 解读抓取 - 业务能力层
//!
//! 打开文档页面 → 点击触发远端生成 → 轮询内容长度判断完成 → 取 HTML → 规整。
//! 整个序列作为一个整体重试，每次尝试都用新借出的页面重新导航。

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::browser::{BrowserPage, BrowserPagePool};
use crate::config::Config;
use crate::error::{BrowserError, FetchError};
use crate::normalizer;
use crate::utils::truncate_text;

/// 解读抓取的时间参数
#[derive(Debug, Clone)]
pub struct FetchTimings {
    /// 导航超时（页面外壳是静态的，很快）
    pub navigation_timeout: Duration,
    /// 等待触发按钮出现的上限
    pub selector_timeout: Duration,
    /// 等待生成完成的上限
    pub poll_timeout: Duration,
    /// 轮询间隔
    pub poll_interval: Duration,
    /// 重试基础延迟，第 n 次重试前等待 base × n
    pub retry_base_delay: Duration,
    /// 仅触发模式下点击后的停顿
    pub trigger_pause: Duration,
}

impl FetchTimings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            navigation_timeout: config.navigation_timeout(),
            selector_timeout: config.selector_timeout(),
            poll_timeout: config.poll_timeout(),
            poll_interval: config.poll_interval(),
            retry_base_delay: config.retry_base_delay(),
            trigger_pause: config.trigger_pause(),
        }
    }
}

/// 由文档 ID 推导出的两个选择器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSelectors {
    /// 触发生成的按钮
    pub trigger: String,
    /// 生成结果的容器
    pub container: String,
}

impl DocumentSelectors {
    /// 点号转义，去掉末尾版本号（`2401.00001v2` → `2401\.00001`）
    pub fn for_document(document_id: &str) -> Self {
        let base = strip_version(document_id.trim()).replace('.', "\\.");
        Self {
            trigger: format!("#kimi-{}", base),
            container: format!("#kimi-container-{}", base),
        }
    }
}

fn strip_version(id: &str) -> &str {
    if let Some(pos) = id.rfind('v') {
        let digits = &id[pos + 1..];
        if pos > 0 && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return &id[..pos];
        }
    }
    id
}

/// 解读抓取器
///
/// 职责：
/// - 按文档 ID 抓取第三方生成的解读
/// - 保证每次尝试借出的页面都被归还
/// - 不认识 Item / 导出
#[derive(Clone)]
pub struct InterpretationFetcher {
    pool: BrowserPagePool,
    base_url: String,
    timings: FetchTimings,
    min_content_length: usize,
    retries: u32,
}

impl InterpretationFetcher {
    pub fn new(pool: BrowserPagePool, config: &Config) -> Self {
        Self {
            pool,
            base_url: config.interpretation_base_url.clone(),
            timings: FetchTimings::from_config(config),
            min_content_length: config.min_content_length,
            retries: config.fetch_retries,
        }
    }

    pub fn with_timings(mut self, timings: FetchTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_min_content_length(mut self, min_content_length: usize) -> Self {
        self.min_content_length = min_content_length;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn document_url(&self, document_id: &str) -> String {
        format!("{}{}", self.base_url, document_id.trim())
    }

    /// 抓取解读并规整为 Markdown
    ///
    /// 失败时整体重试 `retries` 次（共 `retries + 1` 次尝试），
    /// 全部失败后返回带最后一次错误原因的 `FetchError::RetriesExhausted`。
    pub async fn fetch_interpretation(&self, document_id: &str) -> Result<String, FetchError> {
        if document_id.trim().is_empty() {
            return Err(FetchError::EmptyDocumentId);
        }
        let selectors = DocumentSelectors::for_document(document_id);
        let url = self.document_url(document_id);

        let attempts = self.retries + 1;
        let mut last_error = None;
        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = self.timings.retry_base_delay * (attempt - 1);
                debug!("第 {} 次重试前等待 {:?}", attempt - 1, delay);
                sleep(delay).await;
            }

            match self.fetch_once(&url, &selectors).await {
                Ok(html) => {
                    let markdown = normalizer::normalize(&html);
                    info!(
                        "✅ 获取解读成功 ({})，{} 字符",
                        document_id,
                        markdown.chars().count()
                    );
                    debug!("解读预览: {}", truncate_text(&markdown, 120));
                    return Ok(markdown);
                }
                Err(e) => {
                    warn!(
                        "⚠️ 获取解读失败 ({}) 第 {}/{} 次: {}",
                        document_id, attempt, attempts, e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            document_id: document_id.to_string(),
            attempts,
            last_error: last_error.unwrap_or(BrowserError::Shutdown),
        })
    }

    /// 只触发远端生成，不等待结果
    ///
    /// 执行导航 + 点击，再停顿片刻让请求发出。
    pub async fn trigger_generation(&self, document_id: &str) -> bool {
        if document_id.trim().is_empty() {
            return false;
        }
        let selectors = DocumentSelectors::for_document(document_id);
        let url = self.document_url(document_id);

        let lease = match self.pool.acquire().await {
            Ok(lease) => lease,
            Err(e) => {
                warn!("⚠️ 触发解读失败 ({}): {}", document_id, e);
                return false;
            }
        };

        let result = async {
            self.open_and_click(&*lease, &url, &selectors).await?;
            sleep(self.timings.trigger_pause).await;
            Ok::<(), BrowserError>(())
        }
        .await;
        lease.release().await;

        match result {
            Ok(()) => {
                info!("👆 已触发解读生成 ({})", document_id);
                true
            }
            Err(e) => {
                warn!("⚠️ 触发解读失败 ({}): {}", document_id, e);
                false
            }
        }
    }

    /// 单次尝试：借页面 → 导航点击 → 轮询 → 取 HTML，无论成败都归还页面
    async fn fetch_once(
        &self,
        url: &str,
        selectors: &DocumentSelectors,
    ) -> Result<String, BrowserError> {
        let lease = self.pool.acquire().await?;

        let result = async {
            let page: &dyn BrowserPage = &*lease;
            self.open_and_click(page, url, selectors).await?;
            self.wait_for_content(page, &selectors.container).await?;
            let container = &selectors.container;
            bounded(
                &format!("读取 {}", container),
                self.timings.selector_timeout,
                page.inner_html(container),
            )
            .await??
            .ok_or_else(|| BrowserError::ElementNotFound {
                selector: container.clone(),
            })
        }
        .await;

        lease.release().await;
        result
    }

    /// 步骤 1-2：导航，等待触发按钮，点击
    async fn open_and_click(
        &self,
        page: &dyn BrowserPage,
        url: &str,
        selectors: &DocumentSelectors,
    ) -> Result<(), BrowserError> {
        debug!("🌐 打开 {}", url);
        bounded("页面加载", self.timings.navigation_timeout, page.goto(url)).await??;

        let trigger = &selectors.trigger;
        poll_until(
            &format!("元素 {}", trigger),
            self.timings.selector_timeout,
            self.timings.poll_interval,
            || page.exists(trigger),
            |found| *found,
        )
        .await?;

        bounded(
            &format!("点击 {}", trigger),
            self.timings.selector_timeout,
            page.click(trigger),
        )
        .await??;
        debug!("👆 已点击 {}", trigger);
        Ok(())
    }

    /// 步骤 3：轮询容器文本长度，超过阈值视为生成完成
    async fn wait_for_content(
        &self,
        page: &dyn BrowserPage,
        container: &str,
    ) -> Result<(), BrowserError> {
        let min = self.min_content_length;
        let length = poll_until(
            &format!("{} 内容生成", container),
            self.timings.poll_timeout,
            self.timings.poll_interval,
            || page.text_length(container),
            |len| *len > min,
        )
        .await?;
        debug!("内容已生成，{} 字符", length);
        Ok(())
    }
}

/// 给单个操作加上时间上限
async fn bounded<T>(
    what: &str,
    limit: Duration,
    fut: impl Future<Output = T>,
) -> Result<T, BrowserError> {
    timeout(limit, fut)
        .await
        .map_err(|_| BrowserError::timeout(what, limit))
}

/// 按固定间隔轮询，直到条件满足或超时
///
/// 单次探测出错直接返回错误；超时返回 `BrowserError::Timeout`。
async fn poll_until<T, F, Fut, P>(
    what: &str,
    limit: Duration,
    interval: Duration,
    mut check: F,
    done: P,
) -> Result<T, BrowserError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BrowserError>>,
    P: Fn(&T) -> bool,
{
    let deadline = Instant::now() + limit;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(BrowserError::timeout(what, limit));
        }
        let value = bounded(what, remaining, check()).await??;
        if done(&value) {
            return Ok(value);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(BrowserError::timeout(what, limit));
        }
        sleep(interval.min(remaining)).await;
    }
}
