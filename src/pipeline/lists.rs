//! List-item detection.
//!
//! Marks untyped lines as list entries. Bullet glyphs are normalized to
//! `-` by expanding the line into two: the original (marked removed, kept
//! for auditability) and a synthetic replacement whose first word is `-`.
//! Numbered entries (`1.`, `2)`, `三、`) are tagged in place.

use crate::config::ConversionConfig;
use crate::model::{BlockType, Line, PageItem, ParseResult, Word};
use crate::pipeline::Stage;
use once_cell::sync::Lazy;
use regex::Regex;

/// Bullet glyphs normalized to `-`.
const BULLETS: &[char] = &[
    '•', '·', '●', '◦', '○', '▪', '■', '□', '*', '+', '‣', '⁃', '∙', '–',
];

static RE_NUMBERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3}[.)]|[一二三四五六七八九十百千]+、)").unwrap());

pub struct DetectLists;

impl Stage for DetectLists {
    fn name(&self) -> &'static str {
        "lists"
    }

    fn run(&self, parsed: &mut ParseResult, _config: &ConversionConfig) {
        for page in &mut parsed.pages {
            let items = std::mem::take(&mut page.items);
            let mut out: Vec<PageItem> = Vec::with_capacity(items.len());

            for item in items {
                match item {
                    PageItem::Line(line) => detect(line, &mut out),
                    other => out.push(other),
                }
            }
            page.items = out;
        }
    }
}

fn is_bullet_word(word: &Word) -> bool {
    let mut chars = word.text.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(c), None) if BULLETS.contains(&c)
    )
}

fn detect(mut line: Line, out: &mut Vec<PageItem>) {
    if line.removed || line.block_type.is_some() || line.words.is_empty() {
        out.push(PageItem::Line(line));
        return;
    }

    let first = &line.words[0];
    if first.text == "-" {
        line.block_type = Some(BlockType::List);
        out.push(PageItem::Line(line));
        return;
    }

    if is_bullet_word(first) {
        let mut replacement = line.clone();
        replacement.words[0] = Word {
            text: "-".into(),
            ..replacement.words[0].clone()
        };
        replacement.block_type = Some(BlockType::List);

        line.removed = true;
        out.push(PageItem::Line(line));
        out.push(PageItem::Line(replacement));
        return;
    }

    if RE_NUMBERED.is_match(&line.plain_text()) {
        line.block_type = Some(BlockType::List);
    }
    out.push(PageItem::Line(line));
}
