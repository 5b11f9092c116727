//! chromiumoxide 实现
//!
//! 启动本地 Chromium，页面打开时开启 Network 域并拦截非必要资源
//! （图片、字体、样式表、统计脚本）。DOM 查询统一通过执行 JS 完成。

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{BrowserLauncher, BrowserPage, BrowserSession};
use crate::config::Config;
use crate::error::BrowserError;

/// 启动本地 Chromium
pub struct ChromiumLauncher {
    chrome_executable: Option<PathBuf>,
    headless: bool,
    blocked_url_patterns: Vec<String>,
}

impl ChromiumLauncher {
    pub fn new(config: &Config) -> Self {
        Self {
            chrome_executable: config.chrome_executable.as_ref().map(PathBuf::from),
            headless: config.headless,
            blocked_url_patterns: config.blocked_url_patterns.clone(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, BrowserError> {
        info!("🚀 启动{}浏览器...", if self.headless { "无头" } else { "" });

        let mut builder = BrowserConfig::builder();
        builder = if self.headless {
            builder.new_headless_mode()
        } else {
            builder.with_head()
        };
        if let Some(path) = &self.chrome_executable {
            debug!("浏览器路径: {}", path.display());
            builder = builder.chrome_executable(path);
        }

        let config = builder
            .args(vec![
                "--disable-gpu",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--disable-extensions",
            ])
            .build()
            .map_err(|e| {
                error!("配置浏览器失败: {}", e);
                BrowserError::ConfigurationFailed(e)
            })?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            error!("启动浏览器失败: {}", e);
            BrowserError::LaunchFailed(e.to_string())
        })?;

        // 在后台处理浏览器事件
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(Arc::new(ChromiumSession {
            browser: Mutex::new(Some(browser)),
            handler_task: Mutex::new(Some(handler_task)),
            blocked_url_patterns: self.blocked_url_patterns.clone(),
        }))
    }
}

/// 已启动的 Chromium 进程
pub struct ChromiumSession {
    browser: Mutex<Option<Browser>>,
    handler_task: Mutex<Option<JoinHandle<()>>>,
    blocked_url_patterns: Vec<String>,
}

impl ChromiumSession {
    async fn configure(&self, page: &Page) -> Result<(), BrowserError> {
        page.execute(EnableParams::default()).await?;
        if !self.blocked_url_patterns.is_empty() {
            page.execute(SetBlockedUrLsParams::new(self.blocked_url_patterns.clone()))
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        let page = {
            let guard = self.browser.lock().await;
            let browser = guard.as_ref().ok_or(BrowserError::Shutdown)?;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?
        };

        if let Err(e) = self.configure(&page).await {
            error!("配置页面资源拦截失败: {}", e);
            let _ = page.close().await;
            return Err(e);
        }
        Ok(Box::new(ChromiumPage::new(page)))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let browser = self.browser.lock().await.take();
        let result = match browser {
            Some(mut browser) => {
                let closed = browser.close().await.map(|_| ()).map_err(BrowserError::from);
                let _ = browser.wait().await;
                closed
            }
            None => Ok(()),
        };
        if let Some(task) = self.handler_task.lock().await.take() {
            task.abort();
        }
        result
    }
}

/// Chromium 页面
///
/// 职责：
/// - 持有 Page 资源
/// - 暴露 eval() 能力和少量 DOM 查询
/// - 不认识文档 ID / 解读
pub struct ChromiumPage {
    page: Page,
    closed: AtomicBool,
}

impl ChromiumPage {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            closed: AtomicBool::new(false),
        }
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue, BrowserError> {
        if self.is_closed() {
            return Err(BrowserError::PageClosed);
        }
        let result = self.page.evaluate(js_code.into()).await?;
        result
            .into_value()
            .map_err(|e| BrowserError::ScriptFailed(e.to_string()))
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
    ) -> Result<T, BrowserError> {
        let json_value = self.eval(js_code).await?;
        serde_json::from_value(json_value).map_err(|e| BrowserError::ScriptFailed(e.to_string()))
    }
}

/// 把选择器编码为 JS 字符串字面量
fn js_string(selector: &str) -> String {
    serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string())
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        if self.is_closed() {
            return Err(BrowserError::PageClosed);
        }
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn exists(&self, selector: &str) -> Result<bool, BrowserError> {
        self.eval_as(format!(
            "document.querySelector({}) !== null",
            js_string(selector)
        ))
        .await
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound {
                selector: selector.to_string(),
            })?;
        element.click().await?;
        Ok(())
    }

    async fn text_length(&self, selector: &str) -> Result<usize, BrowserError> {
        self.eval_as(format!(
            r#"(() => {{
                const el = document.querySelector({});
                return el && el.textContent ? el.textContent.trim().length : 0;
            }})()"#,
            js_string(selector)
        ))
        .await
    }

    async fn inner_html(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        self.eval_as(format!(
            r#"(() => {{
                const el = document.querySelector({});
                return el ? el.innerHTML : null;
            }})()"#,
            js_string(selector)
        ))
        .await
    }

    async fn reset(&self) -> Result<(), BrowserError> {
        self.goto("about:blank").await
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.page.clone().close().await?;
        Ok(())
    }
}
