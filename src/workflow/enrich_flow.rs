//! 数据项富化流程 - 流程层
//!
//! 核心职责：定义"一篇论文"的富化顺序
//!
//! 流程顺序：
//! 1. 摘要翻译 → `zh_summary`
//! 2. 第三方解读 → `llm_analysis`
//! 3. 没拿到解读且开启了 LLM 分析时，自行调用 LLM 生成 → `llm_analysis`
//!
//! 每一步失败都只在该条数据上追加错误标记，已有字段不会被清空，后续步骤照常执行。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::models::{keys, Item};
use crate::normalizer::parse_qa_text;
use crate::services::llm_service::build_analysis_messages;
use crate::services::{ChatProvider, InterpretationFetcher, Translator};
use crate::utils::truncate_text;
use crate::workflow::item_ctx::ItemCtx;

/// 单条数据的富化结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// 所有步骤成功（或无需执行）
    Enriched,
    /// 至少一步失败，失败原因已写入 metadata
    Failed(String),
}

impl EnrichOutcome {
    pub fn is_enriched(&self) -> bool {
        matches!(self, EnrichOutcome::Enriched)
    }
}

/// 数据项富化能力
#[async_trait]
pub trait ItemEnricher: Send + Sync {
    /// 原地富化一条数据，从不返回错误
    async fn enrich(&self, item: &mut Item, ctx: &ItemCtx) -> EnrichOutcome;
}

/// 论文富化流程
///
/// - 编排翻译 / 解读 / LLM 分析
/// - 不持有任何页面，页面由解读抓取器向池借用
/// - 只依赖业务能力（services）
#[derive(Default)]
pub struct PaperEnricher {
    translator: Option<Arc<dyn Translator>>,
    fetcher: Option<InterpretationFetcher>,
    analyst: Option<Arc<dyn ChatProvider>>,
}

impl PaperEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn with_fetcher(mut self, fetcher: InterpretationFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// 开启 LLM 分析（没有拿到第三方解读时使用）
    pub fn with_analyst(mut self, analyst: Arc<dyn ChatProvider>) -> Self {
        self.analyst = Some(analyst);
        self
    }

    async fn translate_summary(&self, item: &mut Item, ctx: &ItemCtx) -> Result<(), String> {
        let (Some(translator), Some(description)) = (&self.translator, item.description.clone())
        else {
            return Ok(());
        };
        if description.trim().is_empty() {
            return Ok(());
        }

        match translator.translate(&description, "en", "zh-Hans").await {
            Ok(translation) => {
                debug!("{} 翻译完成: {}", ctx, truncate_text(&translation.translation, 40));
                item.set_meta(keys::ZH_SUMMARY, translation.translation);
                Ok(())
            }
            Err(e) => {
                warn!("{} ⚠️ 翻译失败: {}", ctx, e);
                if !item.has_meta(keys::ZH_SUMMARY) {
                    item.set_meta(keys::ZH_SUMMARY, format!("Translation Failed: {}", e));
                }
                let marker = format!("翻译失败: {}", e);
                item.push_error(marker.clone());
                Err(marker)
            }
        }
    }

    /// 返回是否拿到了解读
    async fn fetch_interpretation(&self, item: &mut Item, ctx: &ItemCtx) -> Result<bool, String> {
        let Some(fetcher) = &self.fetcher else {
            return Ok(false);
        };
        let Some(arxiv_id) = item.meta_str(keys::ARXIV_ID) else {
            debug!("{} 没有 arxivId，跳过解读", ctx);
            return Ok(false);
        };

        match fetcher.fetch_interpretation(&arxiv_id).await {
            Ok(markdown) => {
                let pairs = parse_qa_text(&markdown);
                if !pairs.is_empty() {
                    if let Ok(value) = serde_json::to_value(&pairs) {
                        item.set_meta(keys::QA_PAIRS, value);
                    }
                }
                item.set_meta(keys::LLM_ANALYSIS, markdown);
                Ok(true)
            }
            Err(e) => {
                warn!("{} ⚠️ 获取解读失败: {}", ctx, e);
                if !item.has_meta(keys::LLM_ANALYSIS) {
                    item.set_meta(keys::LLM_ANALYSIS, format!("LLM Analysis Failed: {}", e));
                }
                let marker = format!("解读获取失败: {}", e);
                item.push_error(marker.clone());
                Err(marker)
            }
        }
    }

    async fn analyze(&self, item: &mut Item, ctx: &ItemCtx) -> Result<(), String> {
        let Some(analyst) = &self.analyst else {
            return Ok(());
        };

        let content = format!(
            "标题：{}\n摘要：{}",
            item.title,
            item.description.as_deref().unwrap_or_default()
        );
        match analyst.chat(&build_analysis_messages(&content)).await {
            Ok(response) => {
                debug!("{} LLM 分析完成，finish_reason: {:?}", ctx, response.finish_reason);
                item.set_meta(keys::LLM_ANALYSIS, response.content);
                Ok(())
            }
            Err(e) => {
                warn!("{} ⚠️ LLM 分析失败: {}", ctx, e);
                let marker = format!("LLM 分析失败: {}", e);
                item.push_error(marker.clone());
                Err(marker)
            }
        }
    }
}

#[async_trait]
impl ItemEnricher for PaperEnricher {
    async fn enrich(&self, item: &mut Item, ctx: &ItemCtx) -> EnrichOutcome {
        info!("{} 📖 {}", ctx, truncate_text(&item.title, 60));

        let mut failures = Vec::new();

        if let Err(e) = self.translate_summary(item, ctx).await {
            failures.push(e);
        }

        let interpreted = match self.fetch_interpretation(item, ctx).await {
            Ok(found) => found,
            Err(e) => {
                failures.push(e);
                false
            }
        };

        if !interpreted {
            if let Err(e) = self.analyze(item, ctx).await {
                failures.push(e);
            }
        }

        if failures.is_empty() {
            EnrichOutcome::Enriched
        } else {
            EnrichOutcome::Failed(failures.join("; "))
        }
    }
}
