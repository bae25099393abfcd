//! Core data model shared by every pipeline stage.
//!
//! `PageContext.items` holds different element kinds at different pipeline
//! stages, represented as the tagged [`PageItem`] enum: ingestion emits
//! `Run` and `Image` items, line grouping replaces runs with `Line`s, the
//! block gatherer replaces lines with `Block`s. Stages match exhaustively
//! on the tag and assert the variants they expect.
//!
//! Y coordinates follow the PDF convention throughout: larger Y is higher
//! on the page.

use std::collections::HashMap;

/// Stable font identifier (the font's base name, or the resource name
/// when no base name is available).
pub type FontId = String;

/// CJK ideographs, kana, CJK punctuation and full-width forms.
pub(crate) fn is_cjk_char(c: char) -> bool {
    let code = c as u32;
    (0x4E00..=0x9FFF).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        || (0x20000..=0x2EBEF).contains(&code)
        || (0x3040..=0x30FF).contains(&code)
        || (0x3000..=0x303F).contains(&code)
        || (0xFF00..=0xFFEF).contains(&code)
}

// ── Primitive items ──────────────────────────────────────────────────────

/// A single positioned glyph run as produced by ingestion.
///
/// `y` is the baseline. Positions are rounded to integers at ingestion;
/// runs are immutable afterwards and copied when a stage needs a variant.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// NFKC-normalized text.
    pub text: String,
    pub font_id: FontId,
}

/// Encoded raster image format. Records failing the magic-number check
/// for their declared format never enter the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// File extension used in generated image names.
    pub fn ext(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    /// MIME subtype for base64 data URIs.
    pub fn mime(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    /// Detect the format from leading magic bytes.
    pub fn detect(bytes: &[u8]) -> Option<ImageFormat> {
        if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8]) {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }
}

/// A decoded raster image positioned on the page.
///
/// `cx`/`cy` are the placement center; the block gatherer interleaves
/// images using `cy ± height / 2`.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub cx: f32,
    pub cy: f32,
    pub width: f32,
    pub height: f32,
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    /// Generated name, unique across the document:
    /// `{prefix}_image{N}_p{page}.{ext}`.
    pub name: String,
}

// ── Words and lines ──────────────────────────────────────────────────────

/// Discrete inline style derived from per-font [`StyleConfidence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFormat {
    Bold,
    Italic,
    BoldItalic,
}

impl FontFormat {
    /// Markdown marker opening and closing this format.
    pub fn marker(self) -> &'static str {
        match self {
            FontFormat::Bold => "**",
            FontFormat::Italic => "*",
            FontFormat::BoldItalic => "***",
        }
    }
}

/// What a word is, beyond its glyphs.
#[derive(Debug, Clone, PartialEq)]
pub enum WordKind {
    Plain,
    /// Hyperlink; the URL may differ from the glyphs (`www.` words get an
    /// `http://` prefix).
    Link { url: String },
    /// Superscripted number referencing a footnote.
    FootnoteAnchor,
    /// Subscripted number opening a footnote definition.
    FootnoteDef,
}

/// A word inside a line, produced by inline analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub kind: WordKind,
    pub format: Option<FontFormat>,
    /// A column-sized X gap preceded this word. Preserved as a double
    /// space in [`Line::plain_text`] so the table detector can recover
    /// cell boundaries.
    pub col_break: bool,
}

impl Word {
    pub fn plain(text: impl Into<String>) -> Self {
        Word {
            text: text.into(),
            kind: WordKind::Plain,
            format: None,
            col_break: false,
        }
    }
}

/// A logical text line: same-baseline runs merged and analyzed.
#[derive(Debug, Clone)]
pub struct Line {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    /// Max run height on the line.
    pub height: f32,
    /// Font of the line's first run, used for heading features.
    pub font_id: FontId,
    /// Words in ascending-X order.
    pub words: Vec<Word>,
    pub block_type: Option<BlockType>,
    /// Lines consumed by a transformation (bullet normalization, vertical
    /// recombination, empty lines) are marked removed but retained for
    /// auditability; downstream stages and the emitter skip them.
    pub removed: bool,
}

impl Line {
    /// The line's text with single spaces between words and double
    /// spaces at column breaks. Used by the list, TOC and table
    /// detectors; the emitter applies its own spacing and formatting
    /// rules instead.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for word in &self.words {
            if !out.is_empty() {
                out.push_str(if word.col_break { "  " } else { " " });
            }
            out.push_str(&word.text);
        }
        out
    }
}

// ── Blocks ───────────────────────────────────────────────────────────────

/// Closed set of block classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    List,
    Code,
    Table,
    Toc,
    Footnotes,
    Paragraph,
}

impl BlockType {
    /// Whether consecutive lines of this type merge into one block.
    pub fn merge_to_block(self) -> bool {
        !matches!(
            self,
            BlockType::H1
                | BlockType::H2
                | BlockType::H3
                | BlockType::H4
                | BlockType::H5
                | BlockType::H6
        )
    }

    /// Whether a block of this type absorbs subsequent untyped lines
    /// regardless of spacing.
    pub fn merge_following_untyped(self) -> bool {
        matches!(self, BlockType::Footnotes)
    }

    /// Whether a block of this type absorbs subsequent untyped lines
    /// only when the vertical gap is small.
    pub fn merge_following_untyped_small_distance(self) -> bool {
        matches!(self, BlockType::Code | BlockType::Toc | BlockType::Paragraph)
    }

    /// Heading level for `H1..H6`, `None` otherwise.
    pub fn headline_level(self) -> Option<u8> {
        match self {
            BlockType::H1 => Some(1),
            BlockType::H2 => Some(2),
            BlockType::H3 => Some(3),
            BlockType::H4 => Some(4),
            BlockType::H5 => Some(5),
            BlockType::H6 => Some(6),
            _ => None,
        }
    }

    /// Heading type for a level in 1–6.
    pub fn from_headline_level(level: u8) -> Option<BlockType> {
        match level {
            1 => Some(BlockType::H1),
            2 => Some(BlockType::H2),
            3 => Some(BlockType::H3),
            4 => Some(BlockType::H4),
            5 => Some(BlockType::H5),
            6 => Some(BlockType::H6),
            _ => None,
        }
    }
}

/// A group of consecutive lines sharing a classification.
#[derive(Debug, Clone)]
pub struct Block {
    pub lines: Vec<Line>,
    /// `None` until the code/table detectors run; the emitter treats a
    /// still-untyped block as a paragraph.
    pub block_type: Option<BlockType>,
    /// Free-form classifier note (e.g. which table rule fired), kept for
    /// explainability; never serialized into the Markdown.
    pub annotation: Option<String>,
}

impl Block {
    pub fn new(line: Line) -> Self {
        let block_type = line.block_type;
        Block {
            lines: vec![line],
            block_type,
            annotation: None,
        }
    }

    /// X of the leftmost line.
    pub fn min_x(&self) -> f32 {
        self.lines
            .iter()
            .map(|l| l.x)
            .fold(f32::INFINITY, f32::min)
    }

    /// Baseline of the topmost line.
    pub fn top_y(&self) -> f32 {
        self.lines.iter().map(|l| l.y).fold(f32::NEG_INFINITY, f32::max)
    }

    /// Bottom of the lowest line (baseline minus height).
    pub fn bottom_y(&self) -> f32 {
        self.lines
            .iter()
            .map(|l| l.y - l.height)
            .fold(f32::INFINITY, f32::min)
    }
}

// ── Fonts and statistics ─────────────────────────────────────────────────

/// Font metadata as supplied by the PDF.
#[derive(Debug, Clone, Default)]
pub struct FontDescriptor {
    pub id: FontId,
    pub name: String,
    /// Numeric weight from the font descriptor (400 regular, 700 bold).
    pub weight: Option<i64>,
    pub italic_angle: Option<f32>,
}

/// Per-font bold/italic probabilities in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StyleConfidence {
    pub bold: f32,
    pub italic: f32,
}

impl StyleConfidence {
    /// Derive the discrete format. Both confidences use a 0.3 threshold.
    ///
    /// Downstream consults the discrete value only; the raw confidences
    /// are retained for explainability.
    pub fn format(self) -> Option<FontFormat> {
        match (self.bold >= 0.3, self.italic >= 0.3) {
            (true, true) => Some(FontFormat::BoldItalic),
            (true, false) => Some(FontFormat::Bold),
            (false, true) => Some(FontFormat::Italic),
            (false, false) => None,
        }
    }
}

/// Document-wide statistics, produced once and read-only afterwards.
///
/// Stages that produce derived maps (`header_levels`) extend the struct
/// without mutating existing fields.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    /// Most frequent run height across the document.
    pub body_height: f32,
    /// Most frequent font across the document.
    pub body_font: FontId,
    /// Modal positive Y-delta between consecutive body-height runs.
    pub body_distance: f32,
    pub max_height: f32,
    pub max_height_font: FontId,
    /// Per-font style confidence and the derived discrete format.
    pub styles: HashMap<FontId, (StyleConfidence, Option<FontFormat>)>,
    /// Per-font mean of `width / trimmed-text-length`.
    pub avg_char_width: HashMap<FontId, f32>,
    /// fontSize (×10, rounded) → heading level, filled by the header
    /// detector.
    pub header_levels: HashMap<i64, u8>,
    /// Font descriptors seen during ingestion.
    pub fonts: HashMap<FontId, FontDescriptor>,
}

impl Globals {
    /// Discrete format for a font, if any.
    pub fn font_format(&self, font_id: &str) -> Option<FontFormat> {
        self.styles.get(font_id).and_then(|(_, f)| *f)
    }

    /// Histogram key for a height value (0.1 precision).
    pub fn height_key(height: f32) -> i64 {
        (height * 10.0).round() as i64
    }
}

// ── Pages and the parse result ───────────────────────────────────────────

/// One element on a page; the variant set narrows as stages run.
#[derive(Debug, Clone)]
pub enum PageItem {
    Run(TextRun),
    Line(Line),
    Block(Block),
    Image(ImageRecord),
}

/// Per-page state flowing through the pipeline.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    /// 0-indexed page number.
    pub index: usize,
    /// MediaBox width in PDF units.
    pub width: f32,
    /// MediaBox height in PDF units.
    pub height: f32,
    pub items: Vec<PageItem>,
}

/// The shared record every stage reads and rewrites.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub pages: Vec<PageContext>,
    pub globals: Globals,
}
