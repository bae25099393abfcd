//! Markdown emission.
//!
//! Serializes each page's ordered items, one blank line between them.
//! Inline formatting is a small state machine: a marker opens when a
//! word's format differs from the currently open one and closes before
//! the next differently-formatted word, so `**` and `*` always wrap whole
//! word ranges. Code and TOC blocks disable inline markers entirely.

use crate::model::{Block, BlockType, FontFormat, PageContext, PageItem, ParseResult, Word, WordKind};
use crate::pipeline::images::ImageSink;
use crate::pipeline::tables::split_columns;

/// Serialize every page; the sink consumes the image records.
pub fn emit_document(parsed: ParseResult, sink: &mut ImageSink) -> Vec<String> {
    parsed
        .pages
        .into_iter()
        .map(|page| emit_page(page, sink))
        .collect()
}

fn emit_page(page: PageContext, sink: &mut ImageSink) -> String {
    let mut parts: Vec<String> = Vec::new();
    for item in page.items {
        match item {
            PageItem::Block(block) => {
                let rendered = emit_block(block);
                if !rendered.is_empty() {
                    parts.push(rendered);
                }
            }
            PageItem::Image(record) => {
                if let Some(markdown) = sink.render(record) {
                    parts.push(markdown);
                }
            }
            // Lines and runs reaching emission were never gathered
            // (single-stage test harnesses); render them as plain text.
            PageItem::Line(line) if !line.removed => {
                let rendered = render_words(&line.words, true);
                if !rendered.is_empty() {
                    parts.push(rendered);
                }
            }
            _ => {}
        }
    }
    parts.join("\n\n")
}

fn emit_block(block: Block) -> String {
    match block.block_type {
        Some(t) if t.headline_level().is_some() => {
            let level = t.headline_level().expect("checked above") as usize;
            let body = render_words(block.lines.iter().flat_map(|l| &l.words), true);
            format!("{} {}", "#".repeat(level), body)
        }
        Some(BlockType::List) => block
            .lines
            .iter()
            .map(|l| render_words(&l.words, true))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(BlockType::Code) => {
            let body = block
                .lines
                .iter()
                .map(|l| l.plain_text().replace('`', ""))
                .collect::<Vec<_>>()
                .join("\n");
            format!("```\n{}\n```", body)
        }
        Some(BlockType::Table) => emit_table(&block),
        Some(BlockType::Toc) => block
            .lines
            .iter()
            .map(|l| l.plain_text())
            .collect::<Vec<_>>()
            .join("\n"),
        // Footnotes, paragraphs and still-untyped blocks: join the lines
        // into one word stream, inline markers retained.
        _ => render_words(block.lines.iter().flat_map(|l| &l.words), true),
    }
}

// ── Inline rendering ─────────────────────────────────────────────────────

/// Render a word sequence with inline format markers.
///
/// A space separates adjacent words unless the next starts with closing
/// punctuation; a footnote definition marker carries its own trailing
/// space.
fn render_words<'a>(words: impl IntoIterator<Item = &'a Word>, allow_format: bool) -> String {
    let mut out = String::new();
    let mut open: Option<FontFormat> = None;
    let mut suppress_space = true;

    for word in words {
        let target = if allow_format && word.kind == WordKind::Plain {
            word.format
        } else {
            None
        };

        if open != target {
            if let Some(f) = open.take() {
                out.push_str(f.marker());
            }
        }

        let starts_punct = matches!(word.text.chars().next(), Some('.' | '!' | '?'));
        if !suppress_space && !starts_punct {
            out.push(' ');
        }

        if open.is_none() {
            if let Some(f) = target {
                out.push_str(f.marker());
                open = Some(f);
            }
        }

        match &word.kind {
            WordKind::Plain => out.push_str(&word.text),
            WordKind::Link { url } => {
                out.push('[');
                out.push_str(&word.text);
                out.push_str("](");
                out.push_str(url);
                out.push(')');
            }
            WordKind::FootnoteAnchor => {
                out.push_str("[^");
                out.push_str(&word.text);
                out.push(']');
            }
            WordKind::FootnoteDef => {
                out.push_str("[^");
                out.push_str(&word.text);
                out.push_str("]: ");
            }
        }
        suppress_space = word.kind == WordKind::FootnoteDef;
    }

    if let Some(f) = open {
        out.push_str(f.marker());
    }
    out
}

// ── Table rendering ──────────────────────────────────────────────────────

fn is_pipe_row(line: &str) -> bool {
    line.contains('|')
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|')
        && trimmed
            .chars()
            .all(|c| c == '|' || c == '-' || c == ':' || c == ' ')
}

fn pipe_row(cells: &[String]) -> String {
    let mut out = String::from("|");
    for cell in cells {
        out.push(' ');
        out.push_str(cell);
        out.push_str(" |");
    }
    out
}

fn separator_row(columns: usize) -> String {
    pipe_row(&vec!["---".to_string(); columns.max(1)])
}

fn emit_table(block: &Block) -> String {
    let texts: Vec<String> = block
        .lines
        .iter()
        .map(|l| l.plain_text())
        .filter(|t| !t.trim().is_empty())
        .collect();
    if texts.is_empty() {
        return String::new();
    }

    // Literal pipe rows pass through, with a separator guaranteed after
    // the header row.
    if texts.iter().any(|t| is_pipe_row(t)) {
        let mut out: Vec<String> = Vec::with_capacity(texts.len() + 1);
        out.push(texts[0].clone());
        let needs_separator = texts
            .get(1)
            .map(|second| !is_separator_row(second))
            .unwrap_or(true);
        if needs_separator {
            let columns = texts[0].matches('|').count().saturating_sub(1).max(1);
            out.push(separator_row(columns));
        }
        out.extend(texts.iter().skip(1).cloned());
        return out.join("\n");
    }

    if texts.len() == 1 {
        return emit_single_line_table(&texts[0]);
    }

    // Column-aligned rows: split on wide gaps, pad to the widest row.
    let rows: Vec<Vec<String>> = texts
        .iter()
        .map(|t| split_columns(t))
        .filter(|cells| !cells.is_empty())
        .collect();
    let columns = rows.iter().map(|r| r.len()).max().unwrap_or(1);

    let mut out = Vec::with_capacity(rows.len() + 1);
    for (i, mut cells) in rows.into_iter().enumerate() {
        cells.resize(columns, String::new());
        out.push(pipe_row(&cells));
        if i == 0 {
            out.push(separator_row(columns));
        }
    }
    out.join("\n")
}

/// A one-line table: infer the column count from the position of the
/// first status glyph (capped at four) and wrap tokens row by row.
fn emit_single_line_table(text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return String::new();
    }

    let glyph_index = tokens
        .iter()
        .position(|t| ["✅", "⚠", "❌"].iter().any(|g| t.contains(g)));
    let columns = match glyph_index {
        Some(i) if i >= 2 => i.min(4),
        _ => 4.min(tokens.len()),
    };

    let mut out = Vec::new();
    for (i, chunk) in tokens.chunks(columns).enumerate() {
        let mut cells: Vec<String> = chunk.iter().map(|t| t.to_string()).collect();
        cells.resize(columns, String::new());
        out.push(pipe_row(&cells));
        if i == 0 {
            out.push(separator_row(columns));
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::model::Line;

    fn word(text: &str, format: Option<FontFormat>) -> Word {
        Word {
            text: text.to_string(),
            kind: WordKind::Plain,
            format,
            col_break: false,
        }
    }

    fn line_of(words: Vec<Word>, block_type: Option<BlockType>) -> Line {
        Line {
            x: 72.0,
            y: 700.0,
            width: 100.0,
            height: 12.0,
            font_id: "F1".into(),
            words,
            block_type,
            removed: false,
        }
    }

    fn block_of(lines: Vec<Line>, block_type: Option<BlockType>) -> Block {
        Block {
            lines,
            block_type,
            annotation: None,
        }
    }

    #[test]
    fn heading_gets_hash_prefix() {
        let block = block_of(
            vec![line_of(vec![word("Title", None)], Some(BlockType::H2))],
            Some(BlockType::H2),
        );
        assert_eq!(emit_block(block), "## Title");
    }

    #[test]
    fn paragraph_joins_lines_with_spaces() {
        let block = block_of(
            vec![
                line_of(vec![word("first", None), word("line", None)], None),
                line_of(vec![word("second", None), word("line.", None)], None),
            ],
            None,
        );
        assert_eq!(emit_block(block), "first line second line.");
    }

    #[test]
    fn bold_run_is_wrapped_once() {
        let words = vec![
            word("normal", None),
            word("bold", Some(FontFormat::Bold)),
            word("words", Some(FontFormat::Bold)),
            word("again", None),
        ];
        assert_eq!(
            render_words(&words, true),
            "normal **bold words** again"
        );
    }

    #[test]
    fn format_closes_at_end_of_sequence() {
        let words = vec![word("tail", Some(FontFormat::Italic))];
        assert_eq!(render_words(&words, true), "*tail*");
    }

    #[test]
    fn bold_italic_uses_triple_marker() {
        let words = vec![word("both", Some(FontFormat::BoldItalic))];
        assert_eq!(render_words(&words, true), "***both***");
    }

    #[test]
    fn punctuation_words_join_without_space() {
        let words = vec![word("end", None), word(".", None)];
        assert_eq!(render_words(&words, true), "end.");
    }

    #[test]
    fn links_render_as_markdown() {
        let words = vec![Word {
            text: "www.example.org".into(),
            kind: WordKind::Link {
                url: "http://www.example.org".into(),
            },
            format: None,
            col_break: false,
        }];
        assert_eq!(
            render_words(&words, true),
            "[www.example.org](http://www.example.org)"
        );
    }

    #[test]
    fn footnote_anchor_and_def_render() {
        let anchor = vec![
            word("text", None),
            Word {
                text: "2".into(),
                kind: WordKind::FootnoteAnchor,
                format: None,
                col_break: false,
            },
        ];
        assert_eq!(render_words(&anchor, true), "text [^2]");

        let def = vec![
            Word {
                text: "2".into(),
                kind: WordKind::FootnoteDef,
                format: None,
                col_break: false,
            },
            word("the", None),
            word("source", None),
        ];
        assert_eq!(render_words(&def, true), "[^2]: the source");
    }

    #[test]
    fn list_block_keeps_one_entry_per_line() {
        let block = block_of(
            vec![
                line_of(vec![word("-", None), word("one", None)], Some(BlockType::List)),
                line_of(vec![word("-", None), word("two", None)], Some(BlockType::List)),
            ],
            Some(BlockType::List),
        );
        assert_eq!(emit_block(block), "- one\n- two");
    }

    #[test]
    fn code_block_is_fenced_and_stripped_of_backticks() {
        let block = block_of(
            vec![
                line_of(vec![word("let `x` = 1;", None)], Some(BlockType::Code)),
                line_of(vec![word("run();", None)], Some(BlockType::Code)),
            ],
            Some(BlockType::Code),
        );
        assert_eq!(emit_block(block), "```\nlet x = 1;\nrun();\n```");
    }

    #[test]
    fn code_block_disables_inline_markers() {
        let block = block_of(
            vec![line_of(
                vec![word("keyword", Some(FontFormat::Bold))],
                Some(BlockType::Code),
            )],
            Some(BlockType::Code),
        );
        assert_eq!(emit_block(block), "```\nkeyword\n```");
    }

    #[test]
    fn toc_preserves_line_breaks_without_markers() {
        let block = block_of(
            vec![
                line_of(vec![word("1 Intro ...... 3", Some(FontFormat::Bold))], Some(BlockType::Toc)),
                line_of(vec![word("2 Body ...... 9", None)], Some(BlockType::Toc)),
            ],
            Some(BlockType::Toc),
        );
        assert_eq!(emit_block(block), "1 Intro ...... 3\n2 Body ...... 9");
    }

    #[test]
    fn pipe_table_gets_separator_inserted() {
        let block = block_of(
            vec![
                line_of(vec![word("| A | B |", None)], Some(BlockType::Table)),
                line_of(vec![word("| 1 | 2 |", None)], Some(BlockType::Table)),
            ],
            Some(BlockType::Table),
        );
        let out = emit_block(block);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(is_separator_row(lines[1]), "got: {}", lines[1]);
    }

    #[test]
    fn pipe_table_with_separator_is_verbatim() {
        let rows = ["| A | B |", "| --- | --- |", "| 1 | 2 |"];
        let block = block_of(
            rows.iter()
                .map(|r| line_of(vec![word(r, None)], Some(BlockType::Table)))
                .collect(),
            Some(BlockType::Table),
        );
        assert_eq!(emit_block(block), rows.join("\n"));
    }

    #[test]
    fn aligned_columns_become_pipe_rows() {
        let block = block_of(
            vec![
                line_of(vec![word("Name  Type", None)], Some(BlockType::Table)),
                line_of(vec![word("width  f32", None)], Some(BlockType::Table)),
            ],
            Some(BlockType::Table),
        );
        assert_eq!(
            emit_block(block),
            "| Name | Type |\n| --- | --- |\n| width | f32 |"
        );
    }

    #[test]
    fn single_line_table_starts_with_header_and_separator() {
        let block = block_of(
            vec![line_of(
                vec![word(
                    "名称 类型 是否支持 备注 标题 结构 ✅ 多级标题 公式 ✅ 支持",
                    None,
                )],
                Some(BlockType::Table),
            )],
            Some(BlockType::Table),
        );
        let out = emit_block(block);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "| 名称 | 类型 | 是否支持 | 备注 |");
        assert!(is_separator_row(lines[1]));
        assert!(lines.len() >= 3);
    }

    #[test]
    fn none_mode_page_emits_no_image_reference() {
        use crate::model::{Globals, ImageFormat, ImageRecord};
        let page = PageContext {
            index: 0,
            width: 612.0,
            height: 792.0,
            items: vec![
                PageItem::Block(block_of(
                    vec![line_of(vec![word("text", None)], None)],
                    None,
                )),
                PageItem::Image(ImageRecord {
                    cx: 100.0,
                    cy: 100.0,
                    width: 50.0,
                    height: 50.0,
                    bytes: vec![0xFF, 0xD8],
                    format: ImageFormat::Jpeg,
                    name: "pdf_image1_p1.jpg".into(),
                }),
            ],
        };
        let parsed = ParseResult {
            pages: vec![page],
            globals: Globals::default(),
        };
        let mut sink = ImageSink::new(&ConversionConfig::default()).unwrap();
        let pages = emit_document(parsed, &mut sink);
        assert_eq!(pages, vec!["text".to_string()]);
    }
}
