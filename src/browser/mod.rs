//! 浏览器层 - 基础设施层
//!
//! 持有稀缺资源（浏览器进程与页面），只暴露能力：
//! - `BrowserLauncher` 启动共享浏览器进程
//! - `BrowserSession` 在共享进程上开新页面
//! - `BrowserPage` 页面能力（导航、查询、点击、取 HTML）
//! - `BrowserPagePool` 有界页面池，借出/归还
//!
//! 业务层只依赖这些 trait，测试中可以替换为假的实现。

pub mod chromium;
pub mod pool;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BrowserError;

pub use chromium::ChromiumLauncher;
pub use pool::{BrowserPagePool, PageLease};

/// 启动共享浏览器进程
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, BrowserError>;
}

/// 一个已启动的浏览器进程
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// 打开新页面（已配置资源拦截）
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError>;

    /// 关闭浏览器进程
    async fn close(&self) -> Result<(), BrowserError>;
}

/// 单个页面的能力
///
/// 这里的方法都不自带超时，等待上限由调用方统一控制。
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// 导航到指定 URL
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// 元素是否存在
    async fn exists(&self, selector: &str) -> Result<bool, BrowserError>;

    /// 点击元素
    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    /// 元素去掉首尾空白后的文本长度，元素不存在时为 0
    async fn text_length(&self, selector: &str) -> Result<usize, BrowserError>;

    /// 元素的 innerHTML，元素不存在时为 None
    async fn inner_html(&self, selector: &str) -> Result<Option<String>, BrowserError>;

    /// 重置到空白页，准备复用
    async fn reset(&self) -> Result<(), BrowserError>;

    /// 页面是否已关闭
    fn is_closed(&self) -> bool;

    /// 关闭页面
    async fn close(&self) -> Result<(), BrowserError>;
}
