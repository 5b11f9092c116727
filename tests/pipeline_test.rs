use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use paper_digest::exporters::{Exporter, IndexUpdater, JsonExporter, MarkdownExporter};
use paper_digest::models::{keys, ExportResult, Item, ScrapeResult};
use paper_digest::orchestrator::{run_all, Pipeline, RateLimitedBatchRunner};
use paper_digest::services::{HuggingFacePapersSource, Source};
use serde_json::Value as JsonValue;
use tokio::time::Instant;

struct StaticSource {
    items: Vec<Item>,
}

#[async_trait]
impl Source for StaticSource {
    fn name(&self) -> &str {
        HuggingFacePapersSource::NAME
    }

    async fn scrape(&self) -> ScrapeResult {
        ScrapeResult::ok(self.name(), self.items.clone())
    }
}

struct BrokenSource;

#[async_trait]
impl Source for BrokenSource {
    fn name(&self) -> &str {
        "broken"
    }

    async fn scrape(&self) -> ScrapeResult {
        ScrapeResult::failed("broken", "连接被拒绝")
    }
}

struct FailingExporter;

#[async_trait]
impl Exporter for FailingExporter {
    fn name(&self) -> &str {
        "exporter-a"
    }

    async fn export(&self, _items: &[Item], _processed: Option<&JsonValue>) -> ExportResult {
        ExportResult::failed(self.name(), "磁盘已满")
    }
}

fn papers() -> Vec<Item> {
    vec![
        Item::new("hf-0-1", "Attention Is All You Need", HuggingFacePapersSource::NAME)
            .with_description("Transformers.")
            .with_meta(keys::ARXIV_ID, "1706.03762")
            .with_meta(keys::RANK, 1),
        Item::new("hf-1-1", "Scaling Laws", HuggingFacePapersSource::NAME)
            .with_meta(keys::RANK, 2),
    ]
}

#[tokio::test]
async fn test_partial_export_failure() {
    let root = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new("hf", Box::new(StaticSource { items: papers() }))
        .with_exporter(Box::new(FailingExporter))
        .with_exporter(Box::new(JsonExporter::new(root.path(), "hf")));

    let result = pipeline.execute().await;

    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("exporter-a"));

    let written = &result.export_results[1];
    assert!(written.success);
    let path = written.file_path.as_ref().unwrap();
    assert!(path.exists());
    let json: JsonValue = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json["totalItems"], 2);
}

#[tokio::test]
async fn test_full_run_writes_exports_and_index() {
    let json_root = tempfile::tempdir().unwrap();
    let md_root = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new("hf", Box::new(StaticSource { items: papers() }))
        .with_output_dir(json_root.path().join("hf"))
        .with_output_dir(md_root.path().join("hf"))
        .with_exporter(Box::new(JsonExporter::new(json_root.path(), "hf")))
        .with_exporter(Box::new(MarkdownExporter::new(md_root.path(), "hf")))
        .with_index(IndexUpdater::new(md_root.path(), "hf"));

    let result = pipeline.execute().await;
    assert!(result.success, "{:?}", result.errors);
    assert!(result.errors.is_empty());
    assert_eq!(result.export_results.len(), 2);

    let markdown_path: &PathBuf = result.export_results[1].file_path.as_ref().unwrap();
    let markdown = std::fs::read_to_string(markdown_path).unwrap();
    assert!(markdown.contains("Attention Is All You Need"));

    let index = std::fs::read_to_string(md_root.path().join("hf/index.md")).unwrap();
    let day = markdown_path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(index.contains(&day), "{}", index);
}

#[tokio::test]
async fn test_run_all_settles_every_pipeline() {
    let root = tempfile::tempdir().unwrap();
    let pipelines = vec![
        Pipeline::new("broken", Box::new(BrokenSource))
            .with_exporter(Box::new(JsonExporter::new(root.path(), "broken"))),
        Pipeline::new("hf", Box::new(StaticSource { items: papers() }))
            .with_exporter(Box::new(JsonExporter::new(root.path(), "hf"))),
    ];

    let results = run_all(&pipelines).await;

    assert_eq!(results.len(), 2);
    assert!(!results[0].success);
    assert!(results[0].errors[0].contains("连接被拒绝"));
    assert!(results[0].export_results.is_empty());
    assert!(!root.path().join("broken").exists());

    assert!(results[1].success);
    assert_eq!(results[1].items.len(), 2);
}

#[tokio::test]
async fn test_rate_limited_runner_paces_and_keeps_order() {
    let runner = RateLimitedBatchRunner::new(2.0);
    let started = Instant::now();

    let results = runner
        .run(vec!["a", "b", "c"], |id, index| async move {
            if index == 1 {
                Err(format!("{} 失败", id))
            } else {
                Ok(id.to_uppercase())
            }
        })
        .await;

    assert!(started.elapsed() >= Duration::from_millis(1000));
    assert_eq!(
        results,
        vec![
            Ok("A".to_string()),
            Err("b 失败".to_string()),
            Ok("C".to_string())
        ]
    );
}
