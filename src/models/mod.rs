pub mod item;

pub use item::{keys, ExportResult, Item, PipelineResult, ScrapeResult};
