//! 业务能力层（Services）
//!
//! 描述"我能做什么"，每个能力只处理单个对象，不关心流程顺序：
//! - `InterpretationFetcher` 按文档 ID 抓取解读
//! - `LlmService` / `ChatProvider` 对话能力
//! - `LlmTranslator` / `Translator` 翻译能力
//! - `sources` 各数据源

pub mod interpretation;
pub mod llm_service;
pub mod sources;
pub mod translate;

pub use interpretation::{DocumentSelectors, FetchTimings, InterpretationFetcher};
pub use llm_service::{ChatMessage, ChatProvider, ChatResponse, ChatRole, ChatUsage, LlmService};
pub use sources::{ArxivDomainSource, GitHubTrendingSource, HuggingFacePapersSource, Source};
pub use translate::{LlmTranslator, Translation, Translator};
