//! 索引文件
//!
//! 每条流水线的 Markdown 根目录下维护一个 `index.md`，
//! 按年月、日期倒序列出所有已导出的文件。

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use super::{ensure_dir, write_file};
use crate::error::ExportError;

static MONTH_DIR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{6}$").unwrap());
static DAY_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}\.md$").unwrap());

/// 一个年月目录及其中的日期文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthEntry {
    pub month: String,
    pub days: Vec<String>,
}

/// 索引文件维护
pub struct IndexUpdater {
    dir: PathBuf,
    pipeline: String,
}

impl IndexUpdater {
    /// `markdown_root` 是所有流水线共用的 Markdown 根目录
    pub fn new(markdown_root: impl AsRef<Path>, pipeline: impl Into<String>) -> Self {
        let pipeline = pipeline.into();
        Self {
            dir: markdown_root.as_ref().join(&pipeline),
            pipeline,
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join("index.md")
    }

    /// 重新扫描目录并整体重写索引文件
    pub async fn update(&self) -> Result<PathBuf, ExportError> {
        ensure_dir(&self.dir).await?;
        let entries = self.scan().await?;
        let path = self.index_path();
        write_file(&path, &render_index(&self.pipeline, &entries)).await?;
        info!(
            "🗂️ 索引已更新: {}（{} 个月份）",
            path.display(),
            entries.len()
        );
        Ok(path)
    }

    /// 扫描年月目录，月份与日期均倒序
    pub async fn scan(&self) -> Result<Vec<MonthEntry>, ExportError> {
        let mut months = Vec::new();
        for name in list_names(&self.dir, true).await? {
            if !MONTH_DIR.is_match(&name) {
                continue;
            }
            let mut days: Vec<String> = list_names(&self.dir.join(&name), false)
                .await?
                .into_iter()
                .filter(|file| DAY_FILE.is_match(file))
                .collect();
            if days.is_empty() {
                continue;
            }
            days.sort_unstable_by(|a, b| b.cmp(a));
            months.push(MonthEntry { month: name, days });
        }
        months.sort_unstable_by(|a, b| b.month.cmp(&a.month));
        Ok(months)
    }
}

/// 列出目录下的子目录名（`dirs = true`）或文件名
async fn list_names(dir: &Path, dirs: bool) -> Result<Vec<String>, ExportError> {
    let read_err = |source| ExportError::ReadDirFailed {
        path: dir.display().to_string(),
        source,
    };

    let mut names = Vec::new();
    let mut reader = tokio::fs::read_dir(dir).await.map_err(read_err)?;
    while let Some(entry) = reader.next_entry().await.map_err(read_err)? {
        let file_type = entry.file_type().await.map_err(read_err)?;
        if file_type.is_dir() == dirs {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

/// 渲染索引内容
pub fn render_index(pipeline: &str, entries: &[MonthEntry]) -> String {
    let mut md = format!("---\ntitle: {} 索引\nhidden: true\ncomments: false\n---\n\n", pipeline);
    for entry in entries {
        md.push_str(&format!("## {}\n\n", entry.month));
        for day in &entry.days {
            let label = day.trim_end_matches(".md");
            md.push_str(&format!("- [{}]({}/{})\n", label, entry.month, day));
        }
        md.push('\n');
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "x").unwrap();
    }

    #[tokio::test]
    async fn test_index_lists_newest_first() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("hf");
        touch(&dir.join("202312/2023-12-31.md"));
        touch(&dir.join("202401/2024-01-01.md"));
        touch(&dir.join("202401/2024-01-15.md"));
        touch(&dir.join("202401/notes.txt"));
        touch(&dir.join("drafts/2024-01-02.md"));

        let updater = IndexUpdater::new(root.path(), "hf");
        let path = updater.update().await.unwrap();
        let index = std::fs::read_to_string(path).unwrap();

        let jan = index.find("## 202401").unwrap();
        let dec = index.find("## 202312").unwrap();
        assert!(jan < dec);

        let d15 = index.find("- [2024-01-15](202401/2024-01-15.md)").unwrap();
        let d01 = index.find("- [2024-01-01](202401/2024-01-01.md)").unwrap();
        assert!(d15 < d01);

        assert!(!index.contains("notes.txt"));
        assert!(!index.contains("drafts"));
    }

    #[tokio::test]
    async fn test_index_on_empty_dir() {
        let root = tempfile::tempdir().unwrap();
        let updater = IndexUpdater::new(root.path(), "domain");
        let path = updater.update().await.unwrap();
        let index = std::fs::read_to_string(path).unwrap();
        assert!(index.starts_with("---\ntitle: domain 索引"));
        assert!(!index.contains("##"));
    }
}
