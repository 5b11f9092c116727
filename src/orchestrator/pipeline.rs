//! 单条流水线 - 编排层
//!
//! 状态流转：
//!
//! ```text
//! Idle → EnsureOutputDirs → Scrape → [Enrich] → Export → [UpdateIndex] → Done
//!                              ↓
//!                            Failed
//! ```
//!
//! 只有初始抓取失败会短路；富化与导出的失败都被汇总，剩余的数据和导出器照常执行。

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::exporters::{ensure_dir, Exporter, IndexUpdater};
use crate::models::{keys, ExportResult, Item, PipelineResult};
use crate::orchestrator::rate_limiter::RateLimitedBatchRunner;
use crate::services::{InterpretationFetcher, Source};
use crate::workflow::{EnrichOutcome, ItemCtx, ItemEnricher};

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    EnsureOutputDirs,
    Scrape,
    Enrich,
    Export,
    UpdateIndex,
    Done,
    Failed,
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Idle => "空闲",
            PipelineStage::EnsureOutputDirs => "准备输出目录",
            PipelineStage::Scrape => "抓取",
            PipelineStage::Enrich => "富化",
            PipelineStage::Export => "导出",
            PipelineStage::UpdateIndex => "更新索引",
            PipelineStage::Done => "完成",
            PipelineStage::Failed => "失败",
        };
        f.write_str(name)
    }
}

/// 记录阶段流转
struct StageLog<'a> {
    pipeline: &'a str,
    current: PipelineStage,
}

impl<'a> StageLog<'a> {
    fn new(pipeline: &'a str) -> Self {
        Self {
            pipeline,
            current: PipelineStage::Idle,
        }
    }

    fn advance(&mut self, next: PipelineStage) {
        debug!("[{}] {} → {}", self.pipeline, self.current, next);
        self.current = next;
    }
}

/// 一条数据源对应一条流水线
///
/// 每次执行互不影响，执行之间只共享静态配置和页面池。
pub struct Pipeline {
    name: String,
    source: Box<dyn Source>,
    enricher: Option<Arc<dyn ItemEnricher>>,
    exporters: Vec<Box<dyn Exporter>>,
    index: Option<IndexUpdater>,
    output_dirs: Vec<PathBuf>,
    runner: RateLimitedBatchRunner,
    trigger: Option<InterpretationFetcher>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, source: Box<dyn Source>) -> Self {
        Self {
            name: name.into(),
            source,
            enricher: None,
            exporters: Vec::new(),
            index: None,
            output_dirs: Vec::new(),
            runner: RateLimitedBatchRunner::new(0.0),
            trigger: None,
        }
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn ItemEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_exporter(mut self, exporter: Box<dyn Exporter>) -> Self {
        self.exporters.push(exporter);
        self
    }

    pub fn with_index(mut self, index: IndexUpdater) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dirs.push(dir.into());
        self
    }

    /// 富化与触发共用的限速
    pub fn with_rate(mut self, rate_per_second: f64) -> Self {
        self.runner = RateLimitedBatchRunner::new(rate_per_second);
        self
    }

    /// 仅触发模式使用的抓取器
    pub fn with_trigger(mut self, fetcher: InterpretationFetcher) -> Self {
        self.trigger = Some(fetcher);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 是否挂载了解读抓取器（仅触发模式只运行这些流水线）
    pub fn can_trigger(&self) -> bool {
        self.trigger.is_some()
    }

    /// 完整执行一次：抓取 → 富化 → 导出 → 更新索引
    pub async fn execute(&self) -> PipelineResult {
        let start_time = Utc::now();
        let clock = Instant::now();
        let mut stages = StageLog::new(&self.name);
        let mut errors = Vec::new();

        info!("[{}] 🚀 开始执行，数据源: {}", self.name, self.source.name());

        stages.advance(PipelineStage::EnsureOutputDirs);
        for dir in &self.output_dirs {
            if let Err(e) = ensure_dir(dir).await {
                warn!("[{}] ⚠️ {}", self.name, e);
                errors.push(e.to_string());
            }
        }

        stages.advance(PipelineStage::Scrape);
        let mut items = match self.scrape().await {
            Ok(items) => items,
            Err(e) => {
                errors.push(e);
                stages.advance(PipelineStage::Failed);
                return self.finish(false, Vec::new(), Vec::new(), errors, start_time, clock);
            }
        };

        let mut processed = None;
        if let Some(enricher) = &self.enricher {
            stages.advance(PipelineStage::Enrich);
            let (enriched, failed) = self.enrich_all(enricher.as_ref(), items).await;
            info!(
                "[{}] ✨ 富化完成: {}/{} 条成功",
                self.name,
                enriched.len() - failed,
                enriched.len()
            );
            processed = Some(json!({
                "enrichedItems": enriched.len() - failed,
                "failedItems": failed,
            }));
            items = enriched;
        }

        stages.advance(PipelineStage::Export);
        let before = items.len();
        items.retain(Item::is_exportable);
        if items.len() < before {
            warn!("[{}] ⚠️ 丢弃 {} 条缺少标题的数据", self.name, before - items.len());
        }

        let mut export_failed = false;
        let mut export_results = Vec::with_capacity(self.exporters.len());
        for exporter in &self.exporters {
            let result = exporter.export(&items, processed.as_ref()).await;
            if !result.success {
                export_failed = true;
                errors.push(format!(
                    "导出失败 ({}): {}",
                    result.exporter,
                    result.error.as_deref().unwrap_or("未知错误")
                ));
            }
            export_results.push(result);
        }

        if let Some(index) = &self.index {
            stages.advance(PipelineStage::UpdateIndex);
            if let Err(e) = index.update().await {
                warn!("[{}] ⚠️ 索引更新失败: {}", self.name, e);
                errors.push(format!("索引更新失败: {}", e));
            }
        }

        stages.advance(PipelineStage::Done);
        self.finish(!export_failed, items, export_results, errors, start_time, clock)
    }

    /// 仅触发远端生成解读，不收集结果也不导出
    pub async fn trigger_interpretations(&self) -> PipelineResult {
        let start_time = Utc::now();
        let clock = Instant::now();

        let Some(fetcher) = &self.trigger else {
            let reason = format!("[{}] 未配置解读抓取器，无法触发", self.name);
            warn!("{}", reason);
            return self.finish(false, Vec::new(), Vec::new(), vec![reason], start_time, clock);
        };

        let items = match self.scrape().await {
            Ok(items) => items,
            Err(e) => return self.finish(false, Vec::new(), Vec::new(), vec![e], start_time, clock),
        };

        let targets: Vec<String> = items
            .iter()
            .filter_map(|item| item.meta_str(keys::ARXIV_ID))
            .collect();
        let total = targets.len();
        info!("[{}] 🎯 触发 {} 篇论文的解读生成", self.name, total);

        let name = self.name.as_str();
        let outcomes = self
            .runner
            .run(targets, |document_id, index| async move {
                let triggered = fetcher.trigger_generation(&document_id).await;
                if triggered {
                    debug!("[{} #{}/{}] 已触发 {}", name, index + 1, total, document_id);
                } else {
                    warn!("[{} #{}/{}] ⚠️ 触发失败 {}", name, index + 1, total, document_id);
                }
                triggered
            })
            .await;

        let triggered = outcomes.iter().filter(|ok| **ok).count();
        info!("[{}] ✓ 触发完成: {}/{}", self.name, triggered, total);
        self.finish(true, items, Vec::new(), Vec::new(), start_time, clock)
    }

    async fn scrape(&self) -> Result<Vec<Item>, String> {
        let scraped = self.source.scrape().await;
        if !scraped.success {
            let reason = format!(
                "数据抓取失败 ({}): {}",
                scraped.source,
                scraped.error.as_deref().unwrap_or("未知错误")
            );
            error!("[{}] ❌ {}", self.name, reason);
            return Err(reason);
        }
        info!("[{}] 📥 抓取到 {} 条数据", self.name, scraped.items.len());
        Ok(scraped.items)
    }

    /// 限速富化所有数据，返回富化后的数据与失败条数
    async fn enrich_all(&self, enricher: &dyn ItemEnricher, items: Vec<Item>) -> (Vec<Item>, usize) {
        let total = items.len();
        let name = self.name.as_str();

        let outcomes = self
            .runner
            .run(items, |mut item, index| async move {
                let ctx = ItemCtx::new(name, index + 1, total, item.id.clone());
                let outcome = enricher.enrich(&mut item, &ctx).await;
                if let EnrichOutcome::Failed(reason) = &outcome {
                    warn!("{} ⚠️ 部分富化失败: {}", ctx, reason);
                }
                (item, outcome)
            })
            .await;

        let failed = outcomes.iter().filter(|(_, outcome)| !outcome.is_enriched()).count();
        (outcomes.into_iter().map(|(item, _)| item).collect(), failed)
    }

    fn finish(
        &self,
        success: bool,
        items: Vec<Item>,
        export_results: Vec<ExportResult>,
        errors: Vec<String>,
        start_time: DateTime<Utc>,
        clock: Instant,
    ) -> PipelineResult {
        PipelineResult {
            pipeline: self.name.clone(),
            success,
            items,
            export_results,
            errors,
            start_time,
            end_time: Utc::now(),
            duration_ms: clock.elapsed().as_millis() as u64,
        }
    }
}
