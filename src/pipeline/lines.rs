//! Line grouping and inline analysis.
//!
//! Groups same-baseline runs into [`Line`]s, then scans each line left to
//! right: consecutive runs sharing a font format and numeric-ness merge
//! into words, displaced numeric words become footnote anchors or
//! definitions, and `http:`/`www.` words become links. Every word carries
//! the discrete format derived from its font's style confidence.

use crate::config::ConversionConfig;
use crate::model::{BlockType, Globals, Line, PageItem, ParseResult, TextRun, Word, WordKind};
use crate::pipeline::ingest::sort_reading_order;
use crate::pipeline::Stage;

/// X-gap beyond which merged runs get a separating space.
const WORD_GAP: f32 = 5.0;
/// X-gap treated as a column boundary, preserved as a double space so
/// the table detector can still see it.
const COLUMN_GAP: f32 = 12.0;

pub struct GroupLines;

impl Stage for GroupLines {
    fn name(&self) -> &'static str {
        "lines"
    }

    fn run(&self, parsed: &mut ParseResult, _config: &ConversionConfig) {
        let globals = parsed.globals.clone();
        for page in &mut parsed.pages {
            let items = std::mem::take(&mut page.items);
            page.items = group_page(items, &globals);
        }
    }
}

fn group_page(items: Vec<PageItem>, globals: &Globals) -> Vec<PageItem> {
    let tolerance = (globals.body_distance / 2.0).max(1.0);

    let mut out: Vec<PageItem> = Vec::with_capacity(items.len());
    let mut group: Vec<TextRun> = Vec::new();
    let mut anchor_y: f32 = 0.0;

    for item in items {
        match item {
            PageItem::Run(run) => {
                if group.is_empty() || (anchor_y - run.y).abs() <= tolerance {
                    if group.is_empty() {
                        anchor_y = run.y;
                    }
                    group.push(run);
                } else {
                    out.push(PageItem::Line(analyze_line(std::mem::take(&mut group), globals)));
                    anchor_y = run.y;
                    group.push(run);
                }
            }
            other => out.push(other),
        }
    }
    if !group.is_empty() {
        out.push(PageItem::Line(analyze_line(group, globals)));
    }

    sort_reading_order(&mut out);
    out
}

/// Whether a run is a bare number (footnote candidate).
fn is_numeric(text: &str) -> bool {
    let t = text.trim();
    !t.is_empty() && t.chars().all(|c| c.is_ascii_digit())
}

/// The line's baseline: the Y of its widest run. Superscripted anchors
/// and subscripted footnote markers are narrow, so the widest run is the
/// body of the line.
fn baseline_of(runs: &[TextRun]) -> f32 {
    runs.iter()
        .max_by(|a, b| a.width.partial_cmp(&b.width).unwrap_or(std::cmp::Ordering::Equal))
        .map(|r| r.y)
        .unwrap_or(0.0)
}

/// Merge one baseline group into a [`Line`] with analyzed words.
fn analyze_line(mut runs: Vec<TextRun>, globals: &Globals) -> Line {
    runs.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.y.partial_cmp(&a.y).unwrap_or(std::cmp::Ordering::Equal))
    });

    let baseline = baseline_of(&runs);
    let width: f32 = runs.iter().map(|r| r.width).sum();
    let height = runs
        .iter()
        .map(|r| r.height)
        .fold(0.0f32, f32::max);
    let x = runs.first().map(|r| r.x).unwrap_or(0.0);
    let font_id = runs
        .iter()
        .find(|r| !r.text.trim().is_empty())
        .map(|r| r.font_id.clone())
        .unwrap_or_default();

    let mut block_type = None;
    let mut words: Vec<Word> = Vec::new();

    // Merge consecutive runs sharing format and numeric-ness into
    // segments, recording column-sized gaps, then split each segment
    // into whitespace words.
    let mut i = 0;
    while i < runs.len() {
        if runs[i].text.trim().is_empty() {
            i += 1;
            continue;
        }
        let format = globals.font_format(&runs[i].font_id);
        let numeric = is_numeric(&runs[i].text);
        let segment_y = runs[i].y;
        let mut text = runs[i].text.clone();
        let mut end_x = runs[i].x + runs[i].width;

        let mut j = i + 1;
        while j < runs.len() {
            let next = &runs[j];
            if next.text.trim().is_empty() {
                j += 1;
                continue;
            }
            if globals.font_format(&next.font_id) != format || is_numeric(&next.text) != numeric {
                break;
            }
            let gap = next.x - end_x;
            if gap > COLUMN_GAP {
                // Column boundary, recovered after whitespace splitting.
                text.push('\t');
            } else if gap > WORD_GAP || (!text.ends_with(' ') && !next.text.starts_with(' ')) {
                text.push(' ');
            }
            text.push_str(&next.text);
            end_x = next.x + next.width;
            j += 1;
        }
        i = j;

        if numeric {
            // Displaced bare numbers stay one word (footnote anchors and
            // definitions are single tokens by construction).
            let trimmed = text.replace('\t', " ").trim().to_string();
            if trimmed.is_empty() {
                continue;
            }
            let kind = classify_word(&trimmed, true, segment_y, baseline);
            if kind == WordKind::FootnoteDef {
                block_type = Some(BlockType::Footnotes);
            }
            words.push(Word {
                text: trimmed,
                kind,
                format,
                col_break: false,
            });
            continue;
        }

        for (chunk_idx, chunk) in text.split('\t').enumerate() {
            for (word_idx, token) in chunk.split_whitespace().enumerate() {
                let kind = classify_word(token, false, segment_y, baseline);
                words.push(Word {
                    text: token.to_string(),
                    kind,
                    format,
                    col_break: chunk_idx > 0 && word_idx == 0,
                });
            }
        }
    }

    let removed = words.is_empty();
    Line {
        x,
        y: baseline,
        width,
        height,
        font_id,
        words,
        block_type,
        removed,
    }
}

fn classify_word(text: &str, numeric: bool, y: f32, baseline: f32) -> WordKind {
    if numeric {
        if y > baseline + 0.5 {
            return WordKind::FootnoteAnchor;
        }
        if y < baseline - 0.5 {
            return WordKind::FootnoteDef;
        }
    }
    if text.starts_with("http://") || text.starts_with("https://") || text.starts_with("http:") {
        return WordKind::Link {
            url: text.to_string(),
        };
    }
    if text.starts_with("www.") {
        return WordKind::Link {
            url: format!("http://{text}"),
        };
    }
    WordKind::Plain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FontFormat, PageContext, StyleConfidence};

    fn run(x: f32, y: f32, text: &str, height: f32, font: &str) -> TextRun {
        TextRun {
            x,
            y,
            width: text.chars().count() as f32 * height / 2.0,
            height,
            text: text.to_string(),
            font_id: font.to_string(),
        }
    }

    fn globals() -> Globals {
        Globals {
            body_height: 12.0,
            body_font: "Body".into(),
            body_distance: 14.0,
            ..Default::default()
        }
    }

    fn page_of(runs: Vec<TextRun>) -> ParseResult {
        ParseResult {
            pages: vec![PageContext {
                index: 0,
                width: 612.0,
                height: 792.0,
                items: runs.into_iter().map(PageItem::Run).collect(),
            }],
            globals: globals(),
        }
    }

    fn lines_of(parsed: &ParseResult) -> Vec<&Line> {
        parsed.pages[0]
            .items
            .iter()
            .filter_map(|i| match i {
                PageItem::Line(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn same_baseline_runs_form_one_line() {
        let mut parsed = page_of(vec![
            run(72.0, 700.0, "Hello", 12.0, "Body"),
            run(110.0, 700.0, "World", 12.0, "Body"),
            run(72.0, 680.0, "Next", 12.0, "Body"),
        ]);
        GroupLines.run(&mut parsed, &ConversionConfig::default());

        let lines = lines_of(&parsed);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].plain_text(), "Hello World");
        assert_eq!(lines[1].plain_text(), "Next");
    }

    #[test]
    fn line_geometry_follows_runs() {
        let mut parsed = page_of(vec![
            run(72.0, 700.0, "ab", 12.0, "Body"),
            run(90.0, 700.0, "cd", 14.0, "Body"),
        ]);
        GroupLines.run(&mut parsed, &ConversionConfig::default());
        let lines = lines_of(&parsed);
        assert_eq!(lines[0].x, 72.0);
        assert_eq!(lines[0].y, 700.0);
        assert_eq!(lines[0].height, 14.0);
        assert_eq!(lines[0].width, 12.0 + 14.0);
    }

    #[test]
    fn column_gap_is_preserved_as_double_space() {
        let mut parsed = page_of(vec![
            run(72.0, 700.0, "left", 12.0, "Body"),
            // Far to the right: a column boundary, not a word gap.
            run(300.0, 700.0, "right", 12.0, "Body"),
        ]);
        GroupLines.run(&mut parsed, &ConversionConfig::default());
        let lines = lines_of(&parsed);
        assert_eq!(lines[0].words.len(), 2);
        assert!(lines[0].words[1].col_break);
        assert_eq!(lines[0].plain_text(), "left  right");
    }

    #[test]
    fn moderate_gap_inserts_single_space() {
        let mut parsed = page_of(vec![
            run(72.0, 700.0, "ab", 12.0, "Body"),
            // Ends at x = 84; next starts at 92: an 8-unit word gap.
            run(92.0, 700.0, "cd", 12.0, "Body"),
        ]);
        GroupLines.run(&mut parsed, &ConversionConfig::default());
        let lines = lines_of(&parsed);
        assert_eq!(lines[0].words.len(), 2);
        assert!(!lines[0].words[1].col_break);
        assert_eq!(lines[0].plain_text(), "ab cd");
    }

    #[test]
    fn superscript_number_becomes_footnote_anchor() {
        let mut parsed = page_of(vec![
            run(72.0, 700.0, "See the appendix", 12.0, "Body"),
            run(170.0, 704.0, "3", 8.0, "Body"),
        ]);
        GroupLines.run(&mut parsed, &ConversionConfig::default());
        let lines = lines_of(&parsed);
        assert_eq!(lines.len(), 1);
        let anchor = lines[0]
            .words
            .iter()
            .find(|w| w.kind == WordKind::FootnoteAnchor)
            .expect("anchor word");
        assert_eq!(anchor.text, "3");
        assert_eq!(lines[0].block_type, None);
    }

    #[test]
    fn subscript_number_marks_footnote_definition() {
        let mut parsed = page_of(vec![
            run(72.0, 96.0, "3", 8.0, "Body"),
            run(80.0, 100.0, "The cited statistics are from 2024.", 12.0, "Body"),
        ]);
        GroupLines.run(&mut parsed, &ConversionConfig::default());
        let lines = lines_of(&parsed);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].block_type, Some(BlockType::Footnotes));
        assert_eq!(lines[0].words[0].kind, WordKind::FootnoteDef);
    }

    #[test]
    fn url_words_become_links() {
        let mut parsed = page_of(vec![
            run(72.0, 700.0, "https://example.org/doc", 12.0, "Body"),
            run(72.0, 680.0, "www.example.org", 12.0, "Body"),
        ]);
        GroupLines.run(&mut parsed, &ConversionConfig::default());
        let lines = lines_of(&parsed);
        assert_eq!(
            lines[0].words[0].kind,
            WordKind::Link {
                url: "https://example.org/doc".into()
            }
        );
        assert_eq!(
            lines[1].words[0].kind,
            WordKind::Link {
                url: "http://www.example.org".into()
            }
        );
    }

    #[test]
    fn word_format_comes_from_font_confidence() {
        let mut parsed = page_of(vec![
            run(72.0, 700.0, "normal", 12.0, "Body"),
            run(120.0, 700.0, "strong", 12.0, "Heavy"),
        ]);
        parsed.globals.styles.insert(
            "Heavy".into(),
            (
                StyleConfidence { bold: 0.8, italic: 0.0 },
                Some(FontFormat::Bold),
            ),
        );
        GroupLines.run(&mut parsed, &ConversionConfig::default());
        let lines = lines_of(&parsed);
        assert_eq!(lines[0].words.len(), 2);
        assert_eq!(lines[0].words[0].format, None);
        assert_eq!(lines[0].words[1].format, Some(FontFormat::Bold));
    }

    #[test]
    fn whitespace_only_line_is_removed_but_retained() {
        let mut parsed = page_of(vec![run(72.0, 700.0, "   ", 12.0, "Body")]);
        GroupLines.run(&mut parsed, &ConversionConfig::default());
        let lines = lines_of(&parsed);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].removed);
        assert!(lines[0].words.is_empty());
    }
}
