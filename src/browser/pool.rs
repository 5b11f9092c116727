//! 浏览器页面池
//!
//! 一个共享浏览器进程 + 有界的空闲页面集合。
//! 页面只属于池，借出时由 `PageLease` 独占，用完归还或关闭。

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{BrowserLauncher, BrowserPage, BrowserSession};
use crate::error::BrowserError;

/// 归还时重置页面的默认时限
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(5);

/// 有界页面池
///
/// 可以廉价 clone，多条流水线共享同一个池。
#[derive(Clone)]
pub struct BrowserPagePool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    launcher: Arc<dyn BrowserLauncher>,
    session: Mutex<Option<Arc<dyn BrowserSession>>>,
    idle: Mutex<Vec<Box<dyn BrowserPage>>>,
    capacity: usize,
    reset_timeout: Duration,
    leased: AtomicUsize,
    shut_down: AtomicBool,
}

impl BrowserPagePool {
    /// 创建页面池，浏览器进程在第一次借出时才启动
    pub fn new(launcher: Arc<dyn BrowserLauncher>, capacity: usize) -> Self {
        Self::with_reset_timeout(launcher, capacity, DEFAULT_RESET_TIMEOUT)
    }

    /// 指定归还重置时限；重置超时的页面直接关闭，不回到池里
    pub fn with_reset_timeout(
        launcher: Arc<dyn BrowserLauncher>,
        capacity: usize,
        reset_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                launcher,
                session: Mutex::new(None),
                idle: Mutex::new(Vec::new()),
                capacity,
                reset_timeout,
                leased: AtomicUsize::new(0),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// 借出一个页面
    ///
    /// 优先复用池中已重置的页面；池为空时（必要时先启动浏览器）新开页面。
    pub async fn acquire(&self) -> Result<PageLease, BrowserError> {
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return Err(BrowserError::Shutdown);
        }

        loop {
            let candidate = self.inner.idle.lock().await.pop();
            match candidate {
                Some(page) if !page.is_closed() => {
                    debug!("♻️ 复用池中页面");
                    return Ok(self.lease(page));
                }
                Some(_) => debug!("池中页面已关闭，丢弃"),
                None => break,
            }
        }

        let session = self.ensure_session().await?;
        let page = session.new_page().await?;
        debug!("📄 新开页面");
        Ok(self.lease(page))
    }

    /// 关闭所有空闲页面和浏览器进程，重复调用无副作用
    pub async fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            debug!("页面池已经关闭");
            return;
        }

        let pages: Vec<Box<dyn BrowserPage>> = self.inner.idle.lock().await.drain(..).collect();
        for page in pages {
            if page.is_closed() {
                continue;
            }
            if let Err(e) = page.close().await {
                debug!("关闭空闲页面出错（已忽略）: {}", e);
            }
        }

        let session = self.inner.session.lock().await.take();
        if let Some(session) = session {
            if let Err(e) = session.close().await {
                warn!("⚠️ 关闭浏览器出错（已忽略）: {}", e);
            }
        }
        info!("🔒 浏览器页面池已关闭");
    }

    /// 当前空闲页面数
    pub async fn pooled_count(&self) -> usize {
        self.inner.idle.lock().await.len()
    }

    /// 当前借出未归还的页面数
    pub fn leased_count(&self) -> usize {
        self.inner.leased.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    fn lease(&self, page: Box<dyn BrowserPage>) -> PageLease {
        self.inner.leased.fetch_add(1, Ordering::SeqCst);
        PageLease {
            page: Some(page),
            pool: self.clone(),
            runtime: tokio::runtime::Handle::current(),
        }
    }

    /// 启动共享浏览器进程（幂等，并发调用只会启动一次）
    async fn ensure_session(&self) -> Result<Arc<dyn BrowserSession>, BrowserError> {
        let mut guard = self.inner.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return Err(BrowserError::Shutdown);
        }

        info!("🚀 启动共享浏览器进程...");
        let session = self.inner.launcher.launch().await?;
        *guard = Some(session.clone());
        info!("✅ 浏览器已启动");
        Ok(session)
    }

    /// 归还页面：池未满且页面可用时重置后放回，否则关闭
    async fn give_back(&self, page: Box<dyn BrowserPage>) {
        self.inner.leased.fetch_sub(1, Ordering::SeqCst);

        if page.is_closed() {
            debug!("归还的页面已关闭");
            return;
        }

        let has_room = self.inner.idle.lock().await.len() < self.inner.capacity;
        if has_room && !self.inner.shut_down.load(Ordering::SeqCst) {
            match tokio::time::timeout(self.inner.reset_timeout, page.reset()).await {
                Ok(Ok(())) => {
                    let mut idle = self.inner.idle.lock().await;
                    if idle.len() < self.inner.capacity && !self.inner.shut_down.load(Ordering::SeqCst) {
                        idle.push(page);
                        return;
                    }
                }
                Ok(Err(e)) => debug!("重置页面失败，直接关闭: {}", e),
                Err(_) => warn!(
                    "⏱️ 重置页面超过 {}ms，直接关闭",
                    self.inner.reset_timeout.as_millis()
                ),
            }
        }

        match tokio::time::timeout(self.inner.reset_timeout, page.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("关闭页面出错（已忽略）: {}", e),
            Err(_) => warn!("⏱️ 关闭页面超时，放弃该页面"),
        }
    }
}

/// 借出的页面
///
/// 推荐显式调用 `release()`；如果在错误路径上被直接 drop，
/// 会在后台任务里完成归还，页面不会泄漏。
pub struct PageLease {
    page: Option<Box<dyn BrowserPage>>,
    pool: BrowserPagePool,
    runtime: tokio::runtime::Handle,
}

impl PageLease {
    /// 归还页面
    pub async fn release(mut self) {
        if let Some(page) = self.page.take() {
            self.pool.give_back(page).await;
        }
    }

    pub fn page(&self) -> &(dyn BrowserPage + 'static) {
        self.page
            .as_deref()
            .expect("PageLease: page already released")
    }
}

impl Deref for PageLease {
    type Target = dyn BrowserPage;

    fn deref(&self) -> &Self::Target {
        self.page()
    }
}

impl Drop for PageLease {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            let pool = self.pool.clone();
            self.runtime.spawn(async move {
                pool.give_back(page).await;
            });
        }
    }
}
