//! # Paper Digest
//!
//! 论文聚合流水线：抓取每日论文列表，翻译摘要、收集第三方解读，
//! 导出为 JSON 与 Markdown 并维护索引。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Browser）
//! - `browser/` - 持有稀缺资源（浏览器进程与页面），只暴露能力
//! - `BrowserPagePool` - 页面的唯一所有者，借出时返回 `PageLease`，归还有保证
//! - `normalizer/` - 纯函数：解读 HTML → Markdown（表格、公式、LaTeX 文本化）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单条数据
//! - `InterpretationFetcher` - 打开解读页、触发生成、轮询等待、整体重试
//! - `LlmService` / `LlmTranslator` - LLM 对话与翻译能力
//! - `sources/` - HuggingFace / arXiv / GitHub Trending 数据源
//! - `exporters/` - JSON / Markdown 导出与索引维护
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一篇论文"的完整富化流程
//! - `ItemCtx` - 上下文封装（流水线 + 序号）
//! - `PaperEnricher` - 流程编排（翻译 → 解读 → LLM 分析）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 组装并发执行所有流水线，持有页面池
//! - `orchestrator/pipeline` - 单条流水线状态机
//! - `orchestrator/rate_limiter` - 限速顺序批处理
//!
//! ## 模块结构

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod exporters;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{BrowserPagePool, ChromiumLauncher, PageLease};
pub use cli::Cli;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{ExportResult, Item, PipelineResult, ScrapeResult};
pub use normalizer::{convert_latex_to_text, normalize};
pub use orchestrator::{run_all, App, Pipeline, RateLimitedBatchRunner, RunMode};
pub use services::InterpretationFetcher;
pub use workflow::{EnrichOutcome, ItemCtx, PaperEnricher};
