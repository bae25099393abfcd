//! Ingestion: reader output → pipeline primitives.
//!
//! Converts [`RawTextItem`]s into [`TextRun`]s (integer positions, NFKC
//! text, scale-corrected heights) and resolved images into
//! [`ImageRecord`]s (magic-validated bytes, CTM-derived placement), merges
//! them in reading order, and strips repeated page-number artifacts.
//!
//! The async part of ingestion (resolving image objects with a timeout)
//! lives in [`crate::convert`]; this module is the pure tail of it.

use crate::model::{ImageFormat, ImageRecord, PageContext, PageItem, TextRun};
use crate::reader::{RawPage, ResolvedImage};
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

/// Convert one raw text item into a [`TextRun`].
///
/// The reader reports heights in device space (nominal size × matrix
/// scale). Dividing by the norm of the transform's (a, b) components when
/// that quotient exceeds 1 recovers the nominal size for scaled text.
pub fn run_from_raw(item: crate::reader::RawTextItem) -> TextRun {
    let [a, b, _, _, e, f] = item.transform;
    let q = (a * a + b * b).sqrt();
    let mut height = item.height;
    if q > 0.0 && height / q > 1.0 {
        height /= q;
    }
    TextRun {
        x: e.round(),
        y: f.round(),
        width: item.width,
        height,
        text: item.text.nfkc().collect(),
        font_id: item.font_id,
    }
}

/// Convert a resolved image into an [`ImageRecord`], or drop it when the
/// bytes fail the final magic-number check.
///
/// Displayed dimensions are the CTM column norms (the unit square the
/// image is painted into); the record carries the placement center.
pub fn image_from_resolved(
    img: ResolvedImage,
    counter: &mut usize,
    page_index: usize,
    prefix: &str,
) -> Option<ImageRecord> {
    if ImageFormat::detect(&img.bytes) != Some(img.format) {
        warn!("dropping image with mismatched magic bytes");
        return None;
    }
    let [a, b, c, d, e, f] = img.ctm;
    let width = (a * a + b * b).sqrt();
    let height = (c * c + d * d).sqrt();

    *counter += 1;
    let name = format!(
        "{}_image{}_p{}.{}",
        prefix,
        counter,
        page_index + 1,
        img.format.ext()
    );

    Some(ImageRecord {
        cx: e + width / 2.0,
        cy: f + height / 2.0,
        width,
        height,
        bytes: img.bytes,
        format: img.format,
        name,
    })
}

/// Assemble one page: text runs plus resolved images, sorted by Y
/// descending with ties broken by X ascending.
pub fn ingest_page(
    raw: RawPage,
    images: Vec<ResolvedImage>,
    counter: &mut usize,
    prefix: &str,
) -> PageContext {
    let index = raw.index;
    let mut items: Vec<PageItem> = raw
        .texts
        .into_iter()
        .map(|t| PageItem::Run(run_from_raw(t)))
        .collect();

    for img in images {
        if let Some(record) = image_from_resolved(img, counter, index, prefix) {
            items.push(PageItem::Image(record));
        }
    }

    sort_reading_order(&mut items);

    PageContext {
        index,
        width: raw.width,
        height: raw.height,
        items,
    }
}

fn item_y(item: &PageItem) -> f32 {
    match item {
        PageItem::Run(r) => r.y,
        PageItem::Image(i) => i.cy,
        PageItem::Line(l) => l.y,
        PageItem::Block(b) => b.top_y(),
    }
}

fn item_x(item: &PageItem) -> f32 {
    match item {
        PageItem::Run(r) => r.x,
        PageItem::Image(i) => i.cx - i.width / 2.0,
        PageItem::Line(l) => l.x,
        PageItem::Block(b) => b.min_x(),
    }
}

pub(crate) fn sort_reading_order(items: &mut [PageItem]) {
    items.sort_by(|a, b| {
        item_y(b)
            .partial_cmp(&item_y(a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                item_x(a)
                    .partial_cmp(&item_x(b))
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
}

// ── Page-number stripping ────────────────────────────────────────────────

/// How many leading pages the page-number heuristic samples.
const SAMPLE_PAGES: usize = 10;
/// Minimum chain length before integers are treated as page numbers.
const MIN_CHAIN: usize = 3;

/// Bare-integer runs near the top or bottom edge: (value, item index).
fn edge_integers(page: &PageContext) -> Vec<(i64, usize)> {
    let low = page.height * 0.12;
    let high = page.height * 0.88;
    page.items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            let PageItem::Run(run) = item else { return None };
            if run.y > low && run.y < high {
                return None;
            }
            run.text.trim().parse::<i64>().ok().map(|v| (v, idx))
        })
        .collect()
}

/// Detect and remove repeated page-number artifacts.
///
/// Samples the first ten pages for bare integers near a page edge that
/// increase by one from page to page. When a chain of at least three is
/// found, the matching integer run is removed from the chain's first page
/// onward (pages past the sample window are stripped by expected value;
/// pages without a match are left alone).
pub fn strip_page_numbers(pages: &mut [PageContext]) {
    let sample = pages.len().min(SAMPLE_PAGES);
    if sample < MIN_CHAIN {
        return;
    }

    let candidates: Vec<Vec<(i64, usize)>> =
        pages[..sample].iter().map(edge_integers).collect();

    let mut found: Option<(usize, i64)> = None;
    'outer: for start in 0..sample {
        for &(value, _) in &candidates[start] {
            let mut chain = 1;
            for (offset, cands) in candidates[start + 1..sample].iter().enumerate() {
                let expected = value + offset as i64 + 1;
                if cands.iter().any(|&(v, _)| v == expected) {
                    chain += 1;
                } else {
                    break;
                }
            }
            let reachable = sample - start;
            if chain >= MIN_CHAIN && chain == reachable {
                found = Some((start, value));
                break 'outer;
            }
        }
    }

    let Some((start, first_value)) = found else {
        return;
    };
    debug!(
        "stripping page numbers from page {} (first value {})",
        start + 1,
        first_value
    );

    for (offset, page) in pages[start..].iter_mut().enumerate() {
        let expected = first_value + offset as i64;
        if let Some((_, idx)) = edge_integers(page).into_iter().find(|&(v, _)| v == expected) {
            page.items.remove(idx);
        }
    }
}
