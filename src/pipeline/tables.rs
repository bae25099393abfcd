//! Table detection.
//!
//! Tables survive PDF layout in several degraded shapes: literal pipe
//! characters, ruled separator rows, aligned columns separated by wide
//! gaps, or a single line of header keywords and status glyphs. Each
//! shape gets its own acceptance rule; prose is fenced out first by
//! sentence punctuation and paragraph cue words so that a sentence with
//! many short tokens never turns into a table.
//!
//! The keyword list targets CJK documentation corpora and is
//! configurable; the geometric rules are not.

use crate::config::ConversionConfig;
use crate::model::{Block, BlockType, PageItem, ParseResult};
use crate::pipeline::Stage;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

/// Sentence-terminating punctuation (CJK full stops).
const SENTENCE_PUNCT: &[char] = &['。', '！', '？'];
/// Strong table-cell indicators.
const STATUS_GLYPHS: &[&str] = &["✅", "⚠", "❌"];
/// Connectives that mark running prose.
const PARAGRAPH_CUES: &[&str] = &["这是", "用于", "说明", "但是", "所以", "因为", "可以"];

static RE_HEADER_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"名称.*类型.*支持.*备注").unwrap());
/// Column boundaries: runs of two or more spaces, or tabs.
static RE_COLUMN_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}|\t").unwrap());
/// Ruled separator rows (`---`, `===`).
static RE_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(-{3,}|={3,})\s*$").unwrap());

pub struct DetectTables;

impl Stage for DetectTables {
    fn name(&self) -> &'static str {
        "tables"
    }

    fn run(&self, parsed: &mut ParseResult, config: &ConversionConfig) {
        for page in &mut parsed.pages {
            for item in &mut page.items {
                let PageItem::Block(block) = item else { continue };
                if block.block_type.is_some() {
                    continue;
                }
                if let Some(rule) = classify(block, &config.table_keywords) {
                    trace!(rule, "tagged table block of {} lines", block.lines.len());
                    block.block_type = Some(BlockType::Table);
                    block.annotation = Some(rule.to_string());
                }
            }
        }
    }
}

fn has_status_glyph(text: &str) -> bool {
    STATUS_GLYPHS.iter().any(|g| text.contains(g))
}

fn sentence_punct_count(text: &str) -> usize {
    text.chars().filter(|c| SENTENCE_PUNCT.contains(c)).count()
}

/// Decide whether a block is a table; the returned tag names the rule
/// that fired and is stored as the block's annotation.
fn classify(block: &Block, keywords: &[String]) -> Option<&'static str> {
    let lines: Vec<String> = block.lines.iter().map(|l| l.plain_text()).collect();
    if lines.is_empty() {
        return None;
    }
    let aggregated = lines.join(" ");
    let total_chars = aggregated.chars().count();

    // Exclusions: prose never becomes a table.
    if sentence_punct_count(&aggregated) > 0 && total_chars > 30 {
        return None;
    }
    if PARAGRAPH_CUES.iter().any(|c| aggregated.contains(c))
        && total_chars > 20
        && !has_status_glyph(&aggregated)
    {
        return None;
    }

    if lines.len() == 1 {
        single_line_table(&lines[0], keywords)
    } else {
        multi_line_table(&lines)
    }
}

fn single_line_table(text: &str, keywords: &[String]) -> Option<&'static str> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < 4 {
        return None;
    }

    let short = |limit: usize| tokens.iter().filter(|t| t.chars().count() <= limit).count();
    let has_keyword = keywords.iter().any(|k| text.contains(k.as_str()));
    let has_glyph = has_status_glyph(text);

    // Keyword header plus status cells.
    if has_keyword && has_glyph && short(15) >= 4 {
        return Some("keyword-glyph-row");
    }
    // Many short tokens, no sentence punctuation.
    if tokens.len() >= 6 && short(12) >= 5 && sentence_punct_count(text) == 0 {
        return Some("short-token-row");
    }
    // The canonical documentation header row.
    if RE_HEADER_PAIR.is_match(text) && has_glyph && tokens.len() >= 8 {
        return Some("header-pair-row");
    }
    None
}

/// Split one row into cell texts on wide gaps or tabs. Shared with the
/// emitter so detection and serialization agree on cell boundaries.
pub(crate) fn split_columns(line: &str) -> Vec<String> {
    RE_COLUMN_SPLIT
        .split(line.trim())
        .filter(|c| !c.trim().is_empty())
        .map(|c| c.trim().to_string())
        .collect()
}

/// Column count of one row: segments split on wide gaps or tabs.
fn column_count(line: &str) -> usize {
    split_columns(line).len()
}

/// Whether the non-separator rows agree on a column count (within ±2)
/// with every column short enough to be a cell.
fn columns_consistent(lines: &[&String]) -> bool {
    let counts: Vec<usize> = lines.iter().map(|l| column_count(l)).collect();
    if counts.len() < 2 || counts.iter().any(|&c| c < 2) {
        return false;
    }
    let max = *counts.iter().max().expect("non-empty");
    let min = *counts.iter().min().expect("non-empty");
    if max - min > 2 {
        return false;
    }
    lines.iter().all(|l| {
        RE_COLUMN_SPLIT
            .split(l.trim())
            .all(|c| c.trim().chars().count() <= 30)
    })
}

fn multi_line_table(lines: &[String]) -> Option<&'static str> {
    // Literal pipes are the strongest signal.
    if lines.iter().any(|l| l.contains('|')) {
        return Some("pipe-rows");
    }

    let (separators, content): (Vec<&String>, Vec<&String>) =
        lines.iter().partition(|l| RE_SEPARATOR.is_match(l));

    // A ruled row between consistent columns.
    if !separators.is_empty() && content.len() >= 2 && columns_consistent(&content) {
        return Some("separator-columns");
    }

    // No rules at all: aligned columns have to carry the decision alone.
    if separators.is_empty() && content.len() >= 2 && columns_consistent(&content) {
        let aggregated: String = lines.join(" ");
        if sentence_punct_count(&aggregated) < 2 {
            return Some("aligned-columns");
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_table_keywords;
    use crate::model::{Line, Word};

    fn block_of(texts: &[&str]) -> Block {
        Block {
            lines: texts
                .iter()
                .enumerate()
                .map(|(i, t)| Line {
                    x: 72.0,
                    y: 700.0 - i as f32 * 14.0,
                    width: 200.0,
                    height: 12.0,
                    font_id: "F1".into(),
                    words: vec![Word::plain(*t)],
                    block_type: None,
                    removed: false,
                })
                .collect(),
            block_type: None,
            annotation: None,
        }
    }

    fn detect(texts: &[&str]) -> bool {
        classify(&block_of(texts), &default_table_keywords()).is_some()
    }

    #[test]
    fn keyword_and_glyph_single_line_is_a_table() {
        assert!(detect(&[
            "名称 类型 是否支持 备注 标题 结构 ✅ 多级标题 公式 ✅ 支持"
        ]));
    }

    #[test]
    fn short_token_row_without_punctuation_is_a_table() {
        assert!(detect(&["Name Type Default Range Unit Notes"]));
    }

    #[test]
    fn header_pair_pattern_with_glyphs_is_a_table() {
        assert!(detect(&["名称 类型 支持 备注 表格 对象 ✅ 有效 图片 无"]));
    }

    #[test]
    fn prose_with_sentence_punctuation_is_rejected() {
        assert!(!detect(&[
            "这个系统会把文档转换为标准的输出格式。它支持多种输入类型与页面结构。"
        ]));
    }

    #[test]
    fn paragraph_cues_reject_short_prose() {
        assert!(!detect(&["这是用于描述转换流程的说明文字 内容较短"]));
    }

    #[test]
    fn pipe_lines_are_a_table() {
        assert!(detect(&["| Name | Type |", "| width | f32 |"]));
    }

    #[test]
    fn separator_row_with_consistent_columns_is_a_table() {
        assert!(detect(&[
            "Name  Type  Notes",
            "---------",
            "width  f32  points",
            "height  f32  points",
        ]));
    }

    #[test]
    fn aligned_columns_without_rules_are_a_table() {
        assert!(detect(&[
            "Flag  Default  Effect",
            "strict  off  rejects unknown keys",
        ]));
    }

    #[test]
    fn narrow_single_column_text_is_not_a_table() {
        assert!(!detect(&["one line of text", "another line of text"]));
    }

    #[test]
    fn few_tokens_are_not_a_table() {
        assert!(!detect(&["a b c"]));
    }

    #[test]
    fn stage_records_the_fired_rule() {
        use crate::model::{PageContext, ParseResult};

        let mut parsed = ParseResult {
            pages: vec![PageContext {
                index: 0,
                width: 612.0,
                height: 792.0,
                items: vec![PageItem::Block(block_of(&[
                    "| Name | Type |",
                    "| width | f32 |",
                ]))],
            }],
            globals: Default::default(),
        };
        DetectTables.run(&mut parsed, &ConversionConfig::default());

        let PageItem::Block(block) = &parsed.pages[0].items[0] else {
            panic!()
        };
        assert_eq!(block.block_type, Some(BlockType::Table));
        assert_eq!(block.annotation.as_deref(), Some("pipe-rows"));
    }

    #[test]
    fn long_cell_text_defeats_column_detection() {
        assert!(!detect(&[
            "heading  this column segment is far too long to be a believable table cell content",
            "other  short",
        ]));
    }
}
