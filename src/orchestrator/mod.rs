//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责流水线调度和限速，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量流水线处理器
//! - 管理应用生命周期（初始化、运行、清理）
//! - 按配置装配每个数据源的流水线
//! - 并发执行所有流水线（全部结束后再汇总）
//! - 持有页面池，输出全局统计信息
//!
//! ### `pipeline` - 单条流水线
//! - 状态机：准备目录 → 抓取 → 富化 → 导出 → 更新索引
//! - 只有抓取失败会短路，其余失败只汇总
//! - 仅触发模式：抓取后只触发远端解读生成
//!
//! ### `rate_limiter` - 限速批处理
//! - 严格顺序调用，按每秒调用数补足间隔
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<Pipeline>)
//!     ↓
//! pipeline (处理 Vec<Item>，经 rate_limiter 限速)
//!     ↓
//! workflow::PaperEnricher (处理单条 Item)
//!     ↓
//! services (能力层：sources / interpretation / translate / llm)
//!     ↓
//! browser (基础设施：BrowserPagePool)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_processor 管批量，pipeline 管单个数据源
//! 2. **资源隔离**：只有编排层持有页面池
//! 3. **向下依赖**：编排层 → workflow → services → browser
//! 4. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod batch_processor;
pub mod pipeline;
pub mod rate_limiter;

// 重新导出主要类型
pub use batch_processor::{
    build_export_pipeline, build_pipeline, run_all, trigger_all, App, RunMode, DOMAIN_PIPELINE,
    GITHUB_PIPELINE, HF_PIPELINE,
};
pub use pipeline::{Pipeline, PipelineStage};
pub use rate_limiter::RateLimitedBatchRunner;
