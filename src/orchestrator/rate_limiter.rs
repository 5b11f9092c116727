//! 限速批处理
//!
//! 严格顺序调用，每次调用结束后补足剩余的间隔时间。
//! 单条失败由调用方自己包装成结果，本模块从不中断整批处理。

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

/// 按"每秒调用数"限速的顺序批处理器
#[derive(Debug, Clone, Copy)]
pub struct RateLimitedBatchRunner {
    interval: Option<Duration>,
}

impl RateLimitedBatchRunner {
    /// `rate_per_second` 非正数（或非有限值）时不做限速
    pub fn new(rate_per_second: f64) -> Self {
        let interval = (rate_per_second.is_finite() && rate_per_second > 0.0)
            .then(|| Duration::from_secs_f64(1.0 / rate_per_second));
        Self { interval }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// 依次对每个元素调用 `f(item, index)`，结果与输入按位置对齐
    ///
    /// 最后一次调用之后不再等待。
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, mut f: F) -> Vec<R>
    where
        F: FnMut(T, usize) -> Fut,
        Fut: Future<Output = R>,
    {
        let total = items.len();
        let mut results = Vec::with_capacity(total);

        for (index, item) in items.into_iter().enumerate() {
            let started = Instant::now();
            results.push(f(item, index).await);

            let Some(interval) = self.interval else {
                continue;
            };
            if index + 1 == total {
                break;
            }
            let elapsed = started.elapsed();
            if elapsed < interval {
                let wait = interval - elapsed;
                debug!("⏳ 限速等待 {}ms ({}/{})", wait.as_millis(), index + 1, total);
                sleep(wait).await;
            }
        }

        results
    }
}
