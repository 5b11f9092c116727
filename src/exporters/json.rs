//! JSON 导出

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{error, info};

use super::{dated_path, write_file, Exporter};
use crate::error::ExportError;
use crate::models::{ExportResult, Item};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    timestamp: DateTime<Utc>,
    total_items: usize,
    items: &'a [Item],
    processed_data: Option<&'a JsonValue>,
}

/// 导出为格式化的 JSON 文件
pub struct JsonExporter {
    root: PathBuf,
    pipeline: String,
}

impl JsonExporter {
    pub fn new(root: impl Into<PathBuf>, pipeline: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            pipeline: pipeline.into(),
        }
    }

    /// 当天的输出路径
    pub fn output_path(&self) -> PathBuf {
        dated_path(&self.root, &self.pipeline, Local::now().date_naive(), "json")
    }

    pub fn render(items: &[Item], processed: Option<&JsonValue>) -> Result<String, ExportError> {
        let record = JsonExport {
            timestamp: Utc::now(),
            total_items: items.len(),
            items,
            processed_data: processed,
        };
        Ok(serde_json::to_string_pretty(&record)?)
    }

    async fn write(&self, items: &[Item], processed: Option<&JsonValue>) -> Result<PathBuf, ExportError> {
        let path = self.output_path();
        let content = Self::render(items, processed)?;
        write_file(&path, &content).await?;
        Ok(path)
    }
}

#[async_trait]
impl Exporter for JsonExporter {
    fn name(&self) -> &str {
        "json"
    }

    async fn export(&self, items: &[Item], processed: Option<&JsonValue>) -> ExportResult {
        match self.write(items, processed).await {
            Ok(path) => {
                info!("📄 JSON 导出成功: {}", path.display());
                ExportResult::ok(self.name(), path)
            }
            Err(e) => {
                error!("❌ JSON 导出失败: {}", e);
                ExportResult::failed(self.name(), e.to_string())
            }
        }
    }
}
