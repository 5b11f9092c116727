//! 测试用的假浏览器
//!
//! 实现浏览器层的三个 trait，记录启动、开页、关页、重置次数。

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use paper_digest::browser::{BrowserLauncher, BrowserPage, BrowserSession};
use paper_digest::error::BrowserError;
use paper_digest::services::FetchTimings;

/// 假页面的行为
#[derive(Debug, Clone)]
pub struct FakeBehavior {
    /// 触发按钮是否会出现
    pub trigger_appears: bool,
    /// 结果容器的 innerHTML
    pub content_html: String,
    /// 点击永不返回
    pub hang_click: bool,
    /// 读取 innerHTML 永不返回
    pub hang_inner_html: bool,
    /// 重置永不返回
    pub hang_reset: bool,
}

impl Default for FakeBehavior {
    fn default() -> Self {
        Self {
            trigger_appears: true,
            content_html: "<p>Q1: 这篇论文试图解决什么问题？</p><p>A: 长上下文推理的效率问题。</p>"
                .to_string(),
            hang_click: false,
            hang_inner_html: false,
            hang_reset: false,
        }
    }
}

#[derive(Default)]
pub struct Counters {
    pub launches: AtomicUsize,
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
    pub resets: AtomicUsize,
    pub clicks: AtomicUsize,
    pub session_closed: AtomicBool,
}

impl Counters {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.pages_closed.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn clicks(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }
}

struct Shared {
    behavior: FakeBehavior,
    counters: Arc<Counters>,
}

/// 假浏览器启动器
pub struct FakeLauncher {
    shared: Arc<Shared>,
}

impl FakeLauncher {
    pub fn new(behavior: FakeBehavior) -> (Arc<Self>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let launcher = Arc::new(Self {
            shared: Arc::new(Shared {
                behavior,
                counters: counters.clone(),
            }),
        });
        (launcher, counters)
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, BrowserError> {
        self.shared.counters.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeSession {
            shared: self.shared.clone(),
        }))
    }
}

struct FakeSession {
    shared: Arc<Shared>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        self.shared.counters.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            shared: self.shared.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.shared.counters.session_closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct FakePage {
    shared: Arc<Shared>,
    closed: AtomicBool,
}

impl FakePage {
    fn check_open(&self) -> Result<(), BrowserError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(BrowserError::PageClosed)
        } else {
            Ok(())
        }
    }

    fn is_container(selector: &str) -> bool {
        selector.starts_with("#kimi-container-")
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&self, _url: &str) -> Result<(), BrowserError> {
        self.check_open()
    }

    async fn exists(&self, selector: &str) -> Result<bool, BrowserError> {
        self.check_open()?;
        Ok(Self::is_container(selector) || self.shared.behavior.trigger_appears)
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        self.check_open()?;
        if !self.shared.behavior.trigger_appears {
            return Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
            });
        }
        self.shared.counters.clicks.fetch_add(1, Ordering::SeqCst);
        if self.shared.behavior.hang_click {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn text_length(&self, selector: &str) -> Result<usize, BrowserError> {
        self.check_open()?;
        if Self::is_container(selector) {
            Ok(self.shared.behavior.content_html.chars().count())
        } else {
            Ok(0)
        }
    }

    async fn inner_html(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        self.check_open()?;
        if self.shared.behavior.hang_inner_html {
            std::future::pending::<()>().await;
        }
        Ok(Self::is_container(selector).then(|| self.shared.behavior.content_html.clone()))
    }

    async fn reset(&self) -> Result<(), BrowserError> {
        self.check_open()?;
        self.shared.counters.resets.fetch_add(1, Ordering::SeqCst);
        if self.shared.behavior.hang_reset {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shared.counters.pages_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// 测试用的短超时
pub fn fast_timings() -> FetchTimings {
    FetchTimings {
        navigation_timeout: Duration::from_millis(200),
        selector_timeout: Duration::from_millis(50),
        poll_timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(10),
        retry_base_delay: Duration::from_millis(10),
        trigger_pause: Duration::from_millis(10),
    }
}
