//! Heading detection: multi-feature weighted scoring with
//! fontSize-cluster level assignment.
//!
//! No single signal is reliable in PDFs: some documents set headings in
//! the body size but bold, some only add whitespace, some only change the
//! font. Each untyped line is scored over seven weighted features; lines
//! above the threshold are clustered by font size and the top clusters
//! become H1–H4. Pages that carry the document's maximum-height runs get
//! an additional direct assignment so a title page works even when
//! clustering is starved of candidates.
//!
//! Dot-leader lines (`Chapter 1 ...... 12`) are tagged as TOC first so
//! they neither become headings nor pollute the clusters.

use crate::config::ConversionConfig;
use crate::model::{BlockType, Globals, Line, PageItem, ParseResult};
use crate::pipeline::Stage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// Feature weights; they sum to 1.0.
const W_FONT_SIZE: f32 = 0.35;
const W_SPACING: f32 = 0.20;
const W_STANDALONE: f32 = 0.15;
const W_POSITION: f32 = 0.10;
const W_REPETITION: f32 = 0.10;
const W_UPPERCASE: f32 = 0.05;
const W_FONT_DIFF: f32 = 0.05;

/// Gate: a line is only "larger than body" from this ratio on.
const FONT_SIZE_GATE: f32 = 1.15;
/// Clusters assigned heading levels, largest font first.
const MAX_LEVELS: usize = 4;

static RE_DOT_LEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\.{4,}|(\. ){4,})\s*\d+\s*$").unwrap());

pub struct DetectHeaders;

impl Stage for DetectHeaders {
    fn name(&self) -> &'static str {
        "headers"
    }

    fn run(&self, parsed: &mut ParseResult, config: &ConversionConfig) {
        tag_toc_lines(parsed);

        let candidates = collect_candidates(parsed);
        let retained: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.score >= config.header_score_threshold)
            .collect();

        let levels = cluster_levels(&retained, &parsed.globals, config.header_cluster_tolerance);
        debug!(
            candidates = candidates.len(),
            retained = retained.len(),
            clusters = levels.len(),
            "heading clusters assigned"
        );

        // Assign cluster levels.
        for c in &retained {
            if let Some(&level) = levels.get(&Globals::height_key(c.height)) {
                if let PageItem::Line(line) = &mut parsed.pages[c.page].items[c.item] {
                    line.block_type = BlockType::from_headline_level(level);
                }
            }
        }
        parsed.globals.header_levels = levels;

        assign_max_height_headings(parsed);
    }
}

/// Tag dot-leader contents lines as TOC.
fn tag_toc_lines(parsed: &mut ParseResult) {
    for page in &mut parsed.pages {
        for item in &mut page.items {
            let PageItem::Line(line) = item else { continue };
            if line.removed || line.block_type.is_some() {
                continue;
            }
            if RE_DOT_LEADER.is_match(&line.plain_text()) {
                line.block_type = Some(BlockType::Toc);
            }
        }
    }
}

struct Candidate {
    page: usize,
    item: usize,
    height: f32,
    score: f32,
}

fn is_candidate(line: &Line) -> bool {
    !line.removed && line.block_type.is_none() && !line.words.is_empty()
}

fn collect_candidates(parsed: &ParseResult) -> Vec<Candidate> {
    let globals = &parsed.globals;
    let mut out = Vec::new();

    // Document-wide fontSize repetition among candidate lines.
    let mut repetition: HashMap<i64, usize> = HashMap::new();
    for page in &parsed.pages {
        for item in &page.items {
            if let PageItem::Line(line) = item {
                if is_candidate(line) {
                    *repetition.entry(Globals::height_key(line.height)).or_insert(0) += 1;
                }
            }
        }
    }
    let max_repetition = repetition.values().copied().max().unwrap_or(1) as f32;

    for (page_idx, page) in parsed.pages.iter().enumerate() {
        // (item index, y, height) of candidate lines on this page.
        let page_lines: Vec<(usize, f32, f32)> = page
            .items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| match item {
                PageItem::Line(l) if is_candidate(l) => Some((idx, l.y, l.height)),
                _ => None,
            })
            .collect();
        if page_lines.is_empty() {
            continue;
        }

        // Page extent in PDF-up coordinates: the MediaBox top is
        // `page.height`, the bottom is 0.
        let page_max_y = page.height;
        let page_min_y = 0.0f32;
        let y_span = page_max_y - page_min_y;

        for (pos, &(item_idx, y, height)) in page_lines.iter().enumerate() {
            let PageItem::Line(line) = &page.items[item_idx] else {
                continue;
            };

            let ratio = if globals.body_height > 0.0 {
                height / globals.body_height
            } else {
                1.0
            };
            let f_font_size = if ratio >= FONT_SIZE_GATE {
                (ratio / 2.0).min(1.0)
            } else {
                0.0
            };

            let space_before = if pos > 0 {
                page_lines[pos - 1].1 - y
            } else {
                0.0
            };
            let space_after = if pos + 1 < page_lines.len() {
                y - page_lines[pos + 1].1
            } else {
                0.0
            };
            let spacing_unit = (globals.body_distance * 1.5).max(1.0);
            let f_spacing = (space_before.max(space_after) / spacing_unit).clamp(0.0, 1.0);

            let band = height * 0.5;
            let f_standalone = if page_lines
                .iter()
                .any(|&(other, oy, _)| other != item_idx && (oy - y).abs() <= band)
            {
                0.0
            } else {
                1.0
            };

            // Distance below the page top, normalized over the page.
            let f_position = if y_span > 0.0 {
                ((page_max_y - y) / y_span).clamp(0.0, 1.0)
            } else {
                0.0
            };

            let f_repetition = repetition
                .get(&Globals::height_key(height))
                .map(|&c| c as f32 / max_repetition)
                .unwrap_or(0.0);

            let text = line.plain_text();
            let f_uppercase = if text.chars().any(|c| c.is_alphabetic())
                && text == text.to_uppercase()
            {
                1.0
            } else {
                0.0
            };

            let f_font_diff = if line.font_id != globals.body_font {
                1.0
            } else {
                0.0
            };

            let score = W_FONT_SIZE * f_font_size
                + W_SPACING * f_spacing
                + W_STANDALONE * f_standalone
                + W_POSITION * f_position
                + W_REPETITION * f_repetition
                + W_UPPERCASE * f_uppercase
                + W_FONT_DIFF * f_font_diff;

            out.push(Candidate {
                page: page_idx,
                item: item_idx,
                height,
                score,
            });
        }
    }
    out
}

/// Cluster retained candidates by fontSize and assign levels H1..H4 in
/// descending size order.
fn cluster_levels(
    retained: &[&Candidate],
    globals: &Globals,
    tolerance: f32,
) -> HashMap<i64, u8> {
    let mut heights: Vec<f32> = retained.iter().map(|c| c.height).collect();
    heights.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    heights.dedup_by(|a, b| (*a - *b).abs() < f32::EPSILON);

    // Greedy clustering: each new height either joins the last cluster or
    // opens the next one.
    let mut clusters: Vec<Vec<f32>> = Vec::new();
    for h in heights {
        match clusters.last_mut() {
            Some(cluster) if (cluster[0] - h).abs() <= tolerance => cluster.push(h),
            _ => clusters.push(vec![h]),
        }
    }

    // Headings must be larger than body text; drop body-sized clusters.
    clusters.retain(|c| c[0] > globals.body_height + tolerance);

    let mut levels = HashMap::new();
    for (level, cluster) in clusters.iter().take(MAX_LEVELS).enumerate() {
        for &h in cluster {
            levels.insert(Globals::height_key(h), level as u8 + 1);
        }
    }
    levels
}

/// Direct H1/H2 assignment on pages that carry max-height runs.
fn assign_max_height_headings(parsed: &mut ParseResult) {
    let globals = parsed.globals.clone();
    if globals.max_height <= globals.body_height + 1.0 {
        return;
    }
    let h2_floor = globals.body_height + (globals.max_height - globals.body_height) / 3.0;

    for page in &mut parsed.pages {
        let page_has_max = page.items.iter().any(|item| {
            matches!(item, PageItem::Line(l) if !l.removed && (l.height - globals.max_height).abs() < 0.1)
        });
        if !page_has_max {
            continue;
        }
        for item in &mut page.items {
            let PageItem::Line(line) = item else { continue };
            if line.removed || line.block_type.is_some() {
                continue;
            }
            if (line.height - globals.max_height).abs() < 0.1 {
                line.block_type = Some(BlockType::H1);
            } else if line.height > h2_floor {
                line.block_type = Some(BlockType::H2);
            }
        }
    }
}
