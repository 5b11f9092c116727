//! 导出层
//!
//! 每个导出器把一批 Item 写成一个文件，路径按 `<根目录>/<流水线>/<YYYYMM>/<YYYY-MM-DD>.<扩展名>` 组织。
//! 导出器从不返回 `Err`：失败体现在 `ExportResult::success` 上，
//! 由流水线汇总，其余导出器照常执行。

pub mod index;
pub mod json;
pub mod markdown;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::ExportError;
use crate::models::{ExportResult, Item};

pub use index::IndexUpdater;
pub use json::JsonExporter;
pub use markdown::MarkdownExporter;

/// 导出器
#[async_trait]
pub trait Exporter: Send + Sync {
    /// 导出器名称，用于错误汇总
    fn name(&self) -> &str;

    /// 导出一批数据
    async fn export(&self, items: &[Item], processed: Option<&JsonValue>) -> ExportResult;
}

/// `<root>/<pipeline>/<YYYYMM>/<YYYY-MM-DD>.<ext>`
pub fn dated_path(root: &Path, pipeline: &str, date: NaiveDate, ext: &str) -> PathBuf {
    root.join(pipeline)
        .join(date.format("%Y%m").to_string())
        .join(format!("{}.{}", date.format("%Y-%m-%d"), ext))
}

/// 写文件，必要时创建父目录
pub async fn write_file(path: &Path, content: &str) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|source| ExportError::WriteFailed {
            path: path.display().to_string(),
            source,
        })?;
    debug!("💾 已写入 {} ({} 字节)", path.display(), content.len());
    Ok(())
}

/// 创建目录（已存在时无副作用）
pub async fn ensure_dir(dir: &Path) -> Result<(), ExportError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ExportError::CreateDirFailed {
            path: dir.display().to_string(),
            source,
        })
}
