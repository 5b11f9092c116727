//! 批量流水线处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责组装流水线并管理共享资源。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、创建页面池（浏览器延迟到第一次借页时启动）
//! 2. **流水线组装**：按配置为每个数据源装配富化器、导出器和索引
//! 3. **并发执行**：所有流水线同时运行，全部结束后再汇总（单条失败不影响其他）
//! 4. **资源管理**：持有页面池，结束时统一关闭浏览器
//! 5. **全局统计**：汇总所有流水线的执行结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单条数据的细节
//! - **资源所有者**：唯一持有页面池的模块
//! - **向下委托**：委托 Pipeline 执行单个数据源

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::browser::{BrowserPagePool, ChromiumLauncher};
use crate::config::Config;
use crate::error::AppResult;
use crate::exporters::{IndexUpdater, JsonExporter, MarkdownExporter};
use crate::models::PipelineResult;
use crate::orchestrator::pipeline::Pipeline;
use crate::services::{
    ArxivDomainSource, ChatProvider, GitHubTrendingSource, HuggingFacePapersSource,
    InterpretationFetcher, LlmService, LlmTranslator, Source,
};
use crate::utils::logging::{log_pipeline_result, log_startup, print_final_stats};
use crate::workflow::PaperEnricher;

/// HuggingFace 每日论文流水线
pub const HF_PIPELINE: &str = "hf";
/// arXiv 领域论文流水线
pub const DOMAIN_PIPELINE: &str = "domain";
/// GitHub Trending 流水线
pub const GITHUB_PIPELINE: &str = "github";

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// 抓取 → 富化 → 导出 → 索引
    Full,
    /// 只触发远端解读生成，稍后再运行完整模式收集
    TriggerOnly,
}

impl RunMode {
    pub fn describe(&self) -> &'static str {
        match self {
            RunMode::Full => "完整处理模式",
            RunMode::TriggerOnly => "仅触发解读模式",
        }
    }
}

/// 应用主结构
pub struct App {
    pool: BrowserPagePool,
    pipelines: Vec<Pipeline>,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> AppResult<Self> {
        config.validate()?;

        let launcher = Arc::new(ChromiumLauncher::new(&config));
        let pool = BrowserPagePool::with_reset_timeout(
            launcher,
            config.pool_capacity,
            config.page_reset_timeout(),
        );

        let chat: Option<Arc<dyn ChatProvider>> = if config.llm_api_key.trim().is_empty() {
            warn!("⚠️ 未配置 LLM_API_KEY，跳过翻译与 LLM 分析");
            None
        } else {
            Some(Arc::new(LlmService::new(&config)))
        };

        let mut pipelines = vec![
            build_pipeline(
                HF_PIPELINE,
                Box::new(HuggingFacePapersSource::new(&config)),
                &config,
                &pool,
                chat.clone(),
            ),
            build_pipeline(
                DOMAIN_PIPELINE,
                Box::new(ArxivDomainSource::new(&config)),
                &config,
                &pool,
                chat,
            ),
        ];
        if config.enable_github_trending {
            pipelines.push(build_export_pipeline(
                GITHUB_PIPELINE,
                Box::new(GitHubTrendingSource::new(&config)),
                &config,
            ));
        }

        Ok(Self { pool, pipelines })
    }

    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    /// 运行所有流水线并输出统计
    pub async fn run(&self, mode: RunMode) -> Vec<PipelineResult> {
        let names: Vec<String> = self.pipelines.iter().map(|p| p.name().to_string()).collect();
        log_startup(&names, mode.describe());

        let results = match mode {
            RunMode::Full => run_all(&self.pipelines).await,
            RunMode::TriggerOnly => trigger_all(&self.pipelines).await,
        };

        let succeeded = results.iter().filter(|r| r.success).count();
        print_final_stats(succeeded, results.len() - succeeded, results.len());
        results
    }

    /// 关闭页面池与浏览器
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
        info!("👋 浏览器已关闭");
    }
}

/// 只抓取与导出的流水线：导出 JSON 与 Markdown，并维护 Markdown 索引
pub fn build_export_pipeline(name: &str, source: Box<dyn Source>, config: &Config) -> Pipeline {
    let json_root = Path::new(&config.json_output_dir);
    let markdown_root = Path::new(&config.markdown_output_dir);

    Pipeline::new(name, source)
        .with_output_dir(json_root.join(name))
        .with_output_dir(markdown_root.join(name))
        .with_rate(config.enrichment_rate())
        .with_exporter(Box::new(JsonExporter::new(json_root, name)))
        .with_exporter(Box::new(MarkdownExporter::new(markdown_root, name)))
        .with_index(IndexUpdater::new(markdown_root, name))
}

/// 按配置装配一条论文流水线
///
/// - 开启解读时挂载解读抓取器（富化与仅触发模式共用）
/// - 有 LLM 时挂载翻译，开启 LLM 分析时再挂载分析
/// - 导出部分与 `build_export_pipeline` 相同
pub fn build_pipeline(
    name: &str,
    source: Box<dyn Source>,
    config: &Config,
    pool: &BrowserPagePool,
    chat: Option<Arc<dyn ChatProvider>>,
) -> Pipeline {
    let mut pipeline = build_export_pipeline(name, source, config);

    let fetcher = config
        .enable_interpretation
        .then(|| InterpretationFetcher::new(pool.clone(), config));

    if fetcher.is_none() && chat.is_none() {
        return pipeline;
    }

    let mut enricher = PaperEnricher::new();
    if let Some(fetcher) = fetcher {
        enricher = enricher.with_fetcher(fetcher.clone());
        pipeline = pipeline.with_trigger(fetcher);
    }
    if let Some(chat) = chat {
        enricher = enricher.with_translator(Arc::new(LlmTranslator::new(chat.clone())));
        if config.enable_llm_analysis {
            enricher = enricher.with_analyst(chat);
        }
    }

    pipeline.with_enricher(Arc::new(enricher))
}

/// 并发执行所有流水线，全部结束后返回（顺序与输入一致）
pub async fn run_all(pipelines: &[Pipeline]) -> Vec<PipelineResult> {
    let results = join_all(pipelines.iter().map(|p| p.execute())).await;
    for result in &results {
        log_pipeline_result(&result.pipeline, result);
    }
    results
}

/// 并发触发所有挂载了解读抓取器的流水线，其余流水线跳过
pub async fn trigger_all(pipelines: &[Pipeline]) -> Vec<PipelineResult> {
    let targets: Vec<&Pipeline> = pipelines
        .iter()
        .filter(|p| {
            if !p.can_trigger() {
                info!("[{}] ⏭️ 没有解读抓取器，跳过触发", p.name());
            }
            p.can_trigger()
        })
        .collect();
    let results = join_all(targets.iter().map(|p| p.trigger_interpretations())).await;
    for result in &results {
        log_pipeline_result(&result.pipeline, result);
    }
    results
}
