//! Pipeline stages for structural Markdown reconstruction.
//!
//! Each submodule implements exactly one transformation over the shared
//! [`ParseResult`]. Keeping stages separate makes each independently
//! testable and lets us reorder or swap implementations without touching
//! the others.
//!
//! ## Data Flow
//!
//! ```text
//! ingest ─▶ stats ─▶ lines ─▶ vertical ─▶ lists ─▶ headers
//!                                                     │
//!            emit ◀─ tables ◀─ code ◀─ blocks ◀───────┘
//! ```
//!
//! 1. [`ingest`]   — reader output → `TextRun`/`ImageRecord` items
//! 2. [`stats`]    — document-wide statistics (`Globals`)
//! 3. [`lines`]    — baseline grouping + inline analysis
//! 4. [`vertical`] — vertical-text recombination
//! 5. [`lists`]    — list-entry detection
//! 6. [`headers`]  — multi-feature heading scoring and level assignment
//! 7. [`blocks`]   — typed block gathering + image interleave
//! 8. [`code`]     — indented-block code detection
//! 9. [`tables`]   — heuristic table detection
//! 10. [`emit`]    — Markdown serialization (with [`images`] as the sink)
//!
//! Only ingestion may suspend (image object resolution); every stage
//! below is CPU-only and pure over its inputs.

pub mod blocks;
pub mod code;
pub mod emit;
pub mod headers;
pub mod images;
pub mod ingest;
pub mod lines;
pub mod lists;
pub mod stats;
pub mod tables;
pub mod vertical;

use crate::config::ConversionConfig;
use crate::model::ParseResult;
use tracing::debug;

/// One structural transformation over the parse state.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    fn run(&self, parsed: &mut ParseResult, config: &ConversionConfig);
}

/// The structural stages in execution order (everything between ingestion
/// and emission). The pipeline is data: tests can run a prefix of it or
/// inject a single stage in isolation.
pub fn stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(stats::ComputeGlobals),
        Box::new(lines::GroupLines),
        Box::new(vertical::RecombineVertical),
        Box::new(lists::DetectLists),
        Box::new(headers::DetectHeaders),
        Box::new(blocks::GatherBlocks),
        Box::new(code::DetectCode),
        Box::new(tables::DetectTables),
    ]
}

/// Run every structural stage in order.
pub fn run_stages(parsed: &mut ParseResult, config: &ConversionConfig) {
    for stage in stages() {
        debug!(stage = stage.name(), "running pipeline stage");
        stage.run(parsed, config);
    }
}
