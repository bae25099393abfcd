//! Vertical-text recombination.
//!
//! CJK documents sometimes paint titles one glyph per line, top to
//! bottom. After line grouping these surface as columns of
//! single-character lines. This pass stashes consecutive single-character
//! lines of the same character kind descending the page and, when the
//! column is long enough to be deliberate, replaces it with one synthetic
//! horizontal line carrying the concatenated text.

use crate::config::ConversionConfig;
use crate::model::{is_cjk_char, Line, PageItem, ParseResult, Word, WordKind};
use crate::pipeline::Stage;

/// Minimum vertical step between stacked glyphs.
const MIN_STEP: f32 = 5.0;
/// Columns longer than this are recombined; shorter ones flush unchanged.
const MIN_COLUMN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharKind {
    Cjk,
    Letter,
    Digit,
    Other,
}

fn char_kind(c: char) -> CharKind {
    if is_cjk_char(c) {
        CharKind::Cjk
    } else if c.is_alphabetic() {
        CharKind::Letter
    } else if c.is_ascii_digit() {
        CharKind::Digit
    } else {
        CharKind::Other
    }
}

/// The single character of a one-glyph line, if that is what it is.
fn single_char(line: &Line) -> Option<char> {
    if line.removed || line.words.len() != 1 {
        return None;
    }
    let word = &line.words[0];
    if word.kind != WordKind::Plain {
        return None;
    }
    let mut chars = word.text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

pub struct RecombineVertical;

impl Stage for RecombineVertical {
    fn name(&self) -> &'static str {
        "vertical"
    }

    fn run(&self, parsed: &mut ParseResult, _config: &ConversionConfig) {
        for page in &mut parsed.pages {
            let items = std::mem::take(&mut page.items);
            page.items = recombine(items);
        }
    }
}

fn recombine(items: Vec<PageItem>) -> Vec<PageItem> {
    let mut out: Vec<PageItem> = Vec::with_capacity(items.len());
    let mut stash: Vec<Line> = Vec::new();
    let mut kind = CharKind::Other;

    let flush = |stash: &mut Vec<Line>, out: &mut Vec<PageItem>| {
        if stash.len() > MIN_COLUMN {
            let text: String = stash
                .iter()
                .map(|l| l.words[0].text.as_str())
                .collect();
            let format = stash[0].words[0].format;
            let synthetic = Line {
                x: stash.iter().map(|l| l.x).fold(f32::INFINITY, f32::min),
                y: stash.iter().map(|l| l.y).fold(f32::NEG_INFINITY, f32::max),
                width: stash.iter().map(|l| l.width).sum(),
                height: stash.iter().map(|l| l.height).fold(0.0, f32::max),
                font_id: stash[0].font_id.clone(),
                words: vec![Word {
                    text,
                    kind: WordKind::Plain,
                    format,
                    col_break: false,
                }],
                block_type: None,
                removed: false,
            };
            for mut line in stash.drain(..) {
                line.removed = true;
                out.push(PageItem::Line(line));
            }
            out.push(PageItem::Line(synthetic));
        } else {
            for line in stash.drain(..) {
                out.push(PageItem::Line(line));
            }
        }
    };

    for item in items {
        match item {
            PageItem::Line(line) => {
                if let Some(c) = single_char(&line) {
                    let k = char_kind(c);
                    let extends = match stash.last() {
                        Some(prev) => k == kind && prev.y - line.y > MIN_STEP,
                        None => true,
                    };
                    if extends {
                        if stash.is_empty() {
                            kind = k;
                        }
                        stash.push(line);
                    } else {
                        flush(&mut stash, &mut out);
                        kind = k;
                        stash.push(line);
                    }
                } else {
                    flush(&mut stash, &mut out);
                    out.push(PageItem::Line(line));
                }
            }
            other => {
                flush(&mut stash, &mut out);
                out.push(other);
            }
        }
    }
    flush(&mut stash, &mut out);
    out
}
