//! Block gathering: consecutive lines merge into typed [`Block`]s, then
//! images are re-interleaved into reading order.
//!
//! A running stash accumulates lines; a line starts a new block when its
//! type differs from the stash's, when the shared type forbids merging
//! (headings), or when two untyped lines are separated by a "big"
//! vertical gap. Images are held aside during gathering and re-inserted
//! afterwards by Y-range: paint order is not reading order, and text
//! wrapping around an image overlaps it vertically, so ranges (not
//! points) decide the ordering.

use crate::config::ConversionConfig;
use crate::model::{Block, Globals, ImageRecord, Line, PageItem, ParseResult};
#[cfg(test)]
use crate::model::BlockType;
use crate::pipeline::Stage;
use crate::pipeline::ingest::sort_reading_order;
use tracing::trace;

/// Extra slack on the indented-line gap threshold.
const INDENT_SLACK: f32 = 2.0;
/// Y-ranges overlapping by more than this share of their average height
/// are ordered by X instead.
const OVERLAP_SHARE: f32 = 0.2;

pub struct GatherBlocks;

impl Stage for GatherBlocks {
    fn name(&self) -> &'static str {
        "blocks"
    }

    fn run(&self, parsed: &mut ParseResult, _config: &ConversionConfig) {
        let globals = parsed.globals.clone();
        for page in &mut parsed.pages {
            let items = std::mem::take(&mut page.items);
            page.items = gather(items, &globals);
        }
    }
}

/// Whether the gap between two consecutive lines ends an untyped block.
///
/// Reverse flow (the next line sits above the last) is always big; a
/// forward gap is big past one body distance, with extra slack when both
/// lines are indented (list continuations and code bodies sit deeper and
/// breathe more).
fn is_big_distance(last: &Line, next: &Line, globals: &Globals, min_x: f32) -> bool {
    let d = last.y - next.y;
    if d < -globals.body_distance / 2.0 {
        return true;
    }
    let indented = last.x > min_x && next.x > min_x;
    let threshold = if indented {
        globals.body_distance * 1.5 + INDENT_SLACK
    } else {
        globals.body_distance + 1.0
    };
    d > threshold
}

fn should_merge(block: &Block, next: &Line, globals: &Globals, min_x: f32) -> bool {
    let Some(last) = block.lines.last() else {
        return false;
    };
    let big = is_big_distance(last, next, globals, min_x);

    match (block.block_type, next.block_type) {
        (Some(bt), Some(nt)) if bt == nt => bt.merge_to_block(),
        (Some(bt), None) => {
            bt.merge_following_untyped()
                || (bt.merge_following_untyped_small_distance() && !big)
        }
        (None, None) => !big,
        _ => false,
    }
}

fn gather(items: Vec<PageItem>, globals: &Globals) -> Vec<PageItem> {
    let min_x = items
        .iter()
        .filter_map(|item| match item {
            PageItem::Line(l) if !l.removed => Some(l.x),
            _ => None,
        })
        .fold(f32::INFINITY, f32::min);

    let mut images: Vec<ImageRecord> = Vec::new();
    let mut blocks: Vec<Block> = Vec::new();
    let mut stash: Option<Block> = None;

    for item in items {
        match item {
            PageItem::Image(img) => images.push(img),
            PageItem::Line(line) if line.removed => {}
            PageItem::Line(line) => {
                let unmerged = match &mut stash {
                    Some(block) if should_merge(block, &line, globals, min_x) => {
                        block.lines.push(line);
                        None
                    }
                    _ => Some(line),
                };
                if let Some(line) = unmerged {
                    if let Some(block) = stash.take() {
                        blocks.push(block);
                    }
                    stash = Some(Block::new(line));
                }
            }
            // Runs were consumed by line grouping; nested blocks do not
            // occur before this stage.
            PageItem::Run(_) | PageItem::Block(_) => {}
        }
    }
    if let Some(block) = stash.take() {
        blocks.push(block);
    }
    trace!(blocks = blocks.len(), images = images.len(), "gathered page");

    interleave(blocks, images)
}

/// Vertical extent of an item: baseline-to-descender for text, center ±
/// half height for images.
fn y_range(item: &PageItem) -> (f32, f32) {
    match item {
        PageItem::Block(b) => (b.top_y(), b.bottom_y()),
        PageItem::Image(i) => (i.cy + i.height / 2.0, i.cy - i.height / 2.0),
        PageItem::Line(l) => (l.y, l.y - l.height),
        PageItem::Run(r) => (r.y, r.y - r.height),
    }
}

fn x_of(item: &PageItem) -> f32 {
    match item {
        PageItem::Block(b) => b.min_x(),
        PageItem::Image(i) => i.cx - i.width / 2.0,
        PageItem::Line(l) => l.x,
        PageItem::Run(r) => r.x,
    }
}

/// Merge blocks and images into reading order: center-Y descending, with
/// pairs whose ranges overlap substantially ordered by X ascending.
fn interleave(blocks: Vec<Block>, images: Vec<ImageRecord>) -> Vec<PageItem> {
    let mut items: Vec<PageItem> = blocks.into_iter().map(PageItem::Block).collect();
    items.extend(images.into_iter().map(PageItem::Image));

    sort_reading_order(&mut items);
    items.sort_by(|a, b| {
        let (at, ab) = y_range(a);
        let (bt, bb) = y_range(b);
        let ca = (at + ab) / 2.0;
        let cb = (bt + bb) / 2.0;
        cb.partial_cmp(&ca).unwrap_or(std::cmp::Ordering::Equal)
    });

    // Bubble adjacent overlapping pairs into X order. A pass count equal
    // to the item count bounds the worst case.
    for _ in 0..items.len() {
        let mut swapped = false;
        for i in 1..items.len() {
            let (at, ab) = y_range(&items[i - 1]);
            let (bt, bb) = y_range(&items[i]);
            let overlap = at.min(bt) - ab.max(bb);
            let avg_height = ((at - ab) + (bt - bb)) / 2.0;
            if overlap > OVERLAP_SHARE * avg_height && x_of(&items[i - 1]) > x_of(&items[i]) {
                items.swap(i - 1, i);
                swapped = true;
            }
        }
        if !swapped {
            break;
        }
    }
    items
}
