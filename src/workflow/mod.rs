pub mod enrich_flow;
pub mod item_ctx;

pub use enrich_flow::{EnrichOutcome, ItemEnricher, PaperEnricher};
pub use item_ctx::ItemCtx;
