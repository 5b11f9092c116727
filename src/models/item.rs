use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 元数据中约定使用的键
pub mod keys {
    pub const ZH_SUMMARY: &str = "zh_summary";
    pub const LLM_ANALYSIS: &str = "llm_analysis";
    pub const ERRORS: &str = "errors";
    pub const QA_PAIRS: &str = "qa_pairs";
    pub const RANK: &str = "rank";
    pub const DOMAIN: &str = "domain";
    pub const ARXIV_ID: &str = "arxivId";
    pub const ARXIV_URL: &str = "arxivUrl";
    pub const PDF_URL: &str = "pdfUrl";
    pub const COOL_PAPER_URL: &str = "coolPaperUrl";
    pub const AUTHORS: &str = "authors";
    pub const CATEGORIES: &str = "categories";
    pub const PUBLISHED: &str = "published";
    pub const UPDATED: &str = "updated";
    pub const OWNER: &str = "owner";
    pub const REPO_NAME: &str = "name";
    pub const LANGUAGE: &str = "language";
    pub const STARS: &str = "stars";
    pub const FORKS: &str = "forks";
    /// 趋势榜范围：`global` 或具体语言
    pub const TRENDING_SCOPE: &str = "trendingScope";
}

/// 一条抓取到的数据
///
/// ID 在抓取时生成，跨运行不稳定。富化阶段会原地写入 metadata。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, JsonValue>,
}

impl Item {
    /// 创建新的数据项
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            url: None,
            source: source.into(),
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        self.set_meta(key, value);
        self
    }

    /// 写入元数据
    pub fn set_meta(&mut self, key: &str, value: impl Into<JsonValue>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    /// 读取字符串类型的元数据（数字会被格式化为字符串）
    pub fn meta_str(&self, key: &str) -> Option<String> {
        match self.metadata.get(key)? {
            JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// 元数据字段是否已有非空值
    pub fn has_meta(&self, key: &str) -> bool {
        match self.metadata.get(key) {
            None | Some(JsonValue::Null) => false,
            Some(JsonValue::String(s)) => !s.is_empty(),
            Some(JsonValue::Array(list)) => !list.is_empty(),
            Some(JsonValue::Object(map)) => !map.is_empty(),
            Some(_) => true,
        }
    }

    /// 追加错误标记，已有字段保持不变
    pub fn push_error(&mut self, marker: impl Into<String>) {
        let entry = self
            .metadata
            .entry(keys::ERRORS.to_string())
            .or_insert_with(|| JsonValue::Array(Vec::new()));
        match entry {
            JsonValue::Array(list) => list.push(JsonValue::String(marker.into())),
            other => {
                let previous = std::mem::take(other);
                *other = JsonValue::Array(vec![previous, JsonValue::String(marker.into())]);
            }
        }
    }

    /// 已记录的错误标记
    pub fn errors(&self) -> Vec<String> {
        match self.metadata.get(keys::ERRORS) {
            Some(JsonValue::Array(list)) => list
                .iter()
                .map(|v| match v {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// 导出前要求 title 与 source 非空
    pub fn is_exportable(&self) -> bool {
        !self.title.trim().is_empty() && !self.source.trim().is_empty()
    }
}

/// 数据源抓取结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub success: bool,
    pub items: Vec<Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

impl ScrapeResult {
    pub fn ok(source: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            success: true,
            items,
            error: None,
            source: source.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn failed(source: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            items: Vec::new(),
            error: Some(error.into()),
            source: source.into(),
            timestamp: Utc::now(),
        }
    }
}

/// 单个导出器的导出结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    pub exporter: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub exported_at: DateTime<Utc>,
}

impl ExportResult {
    pub fn ok(exporter: impl Into<String>, file_path: PathBuf) -> Self {
        Self {
            exporter: exporter.into(),
            success: true,
            file_path: Some(file_path),
            error: None,
            exported_at: Utc::now(),
        }
    }

    pub fn failed(exporter: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            exporter: exporter.into(),
            success: false,
            file_path: None,
            error: Some(error.into()),
            exported_at: Utc::now(),
        }
    }
}

/// 流水线执行结果
///
/// 只有初始抓取失败或任一导出器失败时 `success` 为 false；
/// 单条数据的富化失败记录在该条数据的 metadata 中。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub pipeline: String,
    pub success: bool,
    pub items: Vec<Item>,
    pub export_results: Vec<ExportResult>,
    pub errors: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_error_keeps_existing_fields() {
        let mut item = Item::new("hf-0", "Title", "HuggingFace Papers")
            .with_meta(keys::ZH_SUMMARY, "中文摘要");
        item.push_error("解读失败: 超时");
        item.push_error("翻译失败");

        assert_eq!(item.meta_str(keys::ZH_SUMMARY).as_deref(), Some("中文摘要"));
        assert_eq!(item.errors(), vec!["解读失败: 超时", "翻译失败"]);
    }

    #[test]
    fn test_meta_str_formats_numbers() {
        let item = Item::new("a", "t", "s").with_meta(keys::RANK, 3);
        assert_eq!(item.meta_str(keys::RANK).as_deref(), Some("3"));
        assert!(!item.has_meta(keys::DOMAIN));
    }

    #[test]
    fn test_has_meta_covers_structured_values() {
        let item = Item::new("a", "t", "s")
            .with_meta(keys::QA_PAIRS, serde_json::json!([{"q": "问题", "a": "回答"}]))
            .with_meta("empty_list", serde_json::json!([]))
            .with_meta("empty_text", "")
            .with_meta("nothing", JsonValue::Null)
            .with_meta("flag", false)
            .with_meta("nested", serde_json::json!({"k": 1}));

        assert!(item.has_meta(keys::QA_PAIRS));
        assert!(item.has_meta("flag"));
        assert!(item.has_meta("nested"));
        assert!(!item.has_meta("empty_list"));
        assert!(!item.has_meta("empty_text"));
        assert!(!item.has_meta("nothing"));
        assert!(!item.has_meta("missing"));
    }

    #[test]
    fn test_is_exportable() {
        assert!(Item::new("a", "t", "s").is_exportable());
        assert!(!Item::new("a", "  ", "s").is_exportable());
    }

    #[test]
    fn test_serializes_camel_case() {
        let item = Item::new("a", "t", "s").with_url("https://example.com");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["url"], "https://example.com");
        assert!(json.get("description").is_none());
    }
}
