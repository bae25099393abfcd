//! Code-block detection.
//!
//! PDFs carry no fence markers; the only surviving signal after layout is
//! indentation. An untyped block whose lines all start right of the
//! page's left margin is treated as code: a single short indented line,
//! or a multi-line block that never returns to the margin.

use crate::config::ConversionConfig;
use crate::model::{Block, BlockType, PageItem, ParseResult};
use crate::pipeline::Stage;

pub struct DetectCode;

impl Stage for DetectCode {
    fn name(&self) -> &'static str {
        "code"
    }

    fn run(&self, parsed: &mut ParseResult, _config: &ConversionConfig) {
        let body_height = parsed.globals.body_height;
        for page in &mut parsed.pages {
            let min_x = page
                .items
                .iter()
                .filter_map(|item| match item {
                    PageItem::Block(b) => Some(b.min_x()),
                    _ => None,
                })
                .fold(f32::INFINITY, f32::min);
            if !min_x.is_finite() {
                continue;
            }

            for item in &mut page.items {
                let PageItem::Block(block) = item else { continue };
                if block.block_type.is_none() && is_code(block, min_x, body_height) {
                    block.block_type = Some(BlockType::Code);
                }
            }
        }
    }
}

fn is_code(block: &Block, min_x: f32, body_height: f32) -> bool {
    match block.lines.len() {
        0 => false,
        1 => {
            let line = &block.lines[0];
            line.x > min_x && line.height <= body_height + 1.0
        }
        _ => block.lines.iter().all(|l| l.x > min_x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Globals, Line, PageContext, Word};

    fn line(x: f32, y: f32, text: &str, height: f32) -> Line {
        Line {
            x,
            y,
            width: 100.0,
            height,
            font_id: "Mono".into(),
            words: text.split_whitespace().map(Word::plain).collect(),
            block_type: None,
            removed: false,
        }
    }

    fn block(lines: Vec<Line>) -> Block {
        Block {
            lines,
            block_type: None,
            annotation: None,
        }
    }

    fn run_page(blocks: Vec<Block>) -> Vec<Option<BlockType>> {
        let mut parsed = ParseResult {
            pages: vec![PageContext {
                index: 0,
                width: 612.0,
                height: 792.0,
                items: blocks.into_iter().map(PageItem::Block).collect(),
            }],
            globals: Globals {
                body_height: 12.0,
                ..Default::default()
            },
        };
        DetectCode.run(&mut parsed, &ConversionConfig::default());
        parsed.pages[0]
            .items
            .iter()
            .map(|i| match i {
                PageItem::Block(b) => b.block_type,
                _ => None,
            })
            .collect()
    }

    #[test]
    fn fully_indented_multiline_block_is_code() {
        let types = run_page(vec![
            block(vec![
                line(72.0, 700.0, "A normal paragraph at the margin", 12.0),
            ]),
            block(vec![
                line(100.0, 660.0, "let x = 1;", 12.0),
                line(100.0, 646.0, "let y = 2;", 12.0),
            ]),
        ]);
        assert_eq!(types[0], None);
        assert_eq!(types[1], Some(BlockType::Code));
    }

    #[test]
    fn single_indented_short_line_is_code() {
        let types = run_page(vec![
            block(vec![line(72.0, 700.0, "paragraph", 12.0)]),
            block(vec![line(110.0, 660.0, "cargo build --release", 12.0)]),
        ]);
        assert_eq!(types[1], Some(BlockType::Code));
    }

    #[test]
    fn single_indented_large_line_is_not_code() {
        // Indented but oversized: a centered heading candidate, not code.
        let types = run_page(vec![
            block(vec![line(72.0, 700.0, "paragraph", 12.0)]),
            block(vec![line(110.0, 660.0, "Centered Title", 18.0)]),
        ]);
        assert_eq!(types[1], None);
    }

    #[test]
    fn block_touching_margin_is_not_code() {
        let types = run_page(vec![
            block(vec![
                line(72.0, 700.0, "starts at margin", 12.0),
                line(100.0, 686.0, "wrapped continuation", 12.0),
            ]),
        ]);
        assert_eq!(types[0], None);
    }

    #[test]
    fn typed_blocks_are_not_reclassified() {
        let mut list = block(vec![line(100.0, 660.0, "- indented item", 12.0)]);
        list.block_type = Some(BlockType::List);
        let types = run_page(vec![
            block(vec![line(72.0, 700.0, "paragraph", 12.0)]),
            list,
        ]);
        assert_eq!(types[1], Some(BlockType::List));
    }
}
