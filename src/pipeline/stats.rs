//! Document-wide statistics: the baseline every later classifier
//! compares against.
//!
//! Body height and body font are the modes of run heights and fonts;
//! body distance is the modal positive Y-delta between consecutive
//! body-height runs. Per-font average character widths feed the style
//! classifier: a font whose average glyph is measurably wider than the
//! body font's is likely bold even when its descriptor says nothing.

use crate::config::ConversionConfig;
use crate::model::{FontId, Globals, PageItem, ParseResult, StyleConfidence};
use crate::pipeline::Stage;
use std::collections::HashMap;
use tracing::debug;

/// Fallbacks for degenerate documents (no text at all).
const DEFAULT_BODY_HEIGHT: f32 = 12.0;
const DEFAULT_BODY_DISTANCE: f32 = 14.4;

/// Runs within this height tolerance of the body height count as body
/// text for width and spacing statistics.
const BODY_HEIGHT_TOLERANCE: f32 = 0.5;

pub struct ComputeGlobals;

impl Stage for ComputeGlobals {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn run(&self, parsed: &mut ParseResult, _config: &ConversionConfig) {
        let mut height_hist: HashMap<i64, usize> = HashMap::new();
        let mut font_hist: HashMap<FontId, usize> = HashMap::new();
        let mut max_height = 0.0f32;
        let mut max_height_font = FontId::new();

        for page in &parsed.pages {
            for item in &page.items {
                let PageItem::Run(run) = item else { continue };
                if run.text.trim().is_empty() {
                    continue;
                }
                *height_hist.entry(Globals::height_key(run.height)).or_insert(0) += 1;
                *font_hist.entry(run.font_id.clone()).or_insert(0) += 1;
                if run.height > max_height {
                    max_height = run.height;
                    max_height_font = run.font_id.clone();
                }
            }
        }

        let body_height = mode_key(&height_hist)
            .map(|k| k as f32 / 10.0)
            .unwrap_or(DEFAULT_BODY_HEIGHT);
        let body_font = font_hist
            .iter()
            // Tie-break on the name itself for determinism.
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(font, _)| font.clone())
            .unwrap_or_default();

        let body_distance = body_distance(parsed, body_height);
        let avg_char_width = average_char_widths(parsed, body_height);

        let mut globals = Globals {
            body_height,
            body_font: body_font.clone(),
            body_distance,
            max_height,
            max_height_font: max_height_font.clone(),
            avg_char_width,
            fonts: std::mem::take(&mut parsed.globals.fonts),
            ..Default::default()
        };

        let body_avg = globals
            .avg_char_width
            .get(&body_font)
            .copied()
            .unwrap_or_else(|| overall_mean(&globals.avg_char_width));

        for font in font_hist.keys() {
            let confidence = if *font == body_font {
                StyleConfidence::default()
            } else {
                style_confidence(&globals, font, body_avg)
            };
            globals
                .styles
                .insert(font.clone(), (confidence, confidence.format()));
        }

        debug!(
            body_height,
            body_distance,
            max_height,
            fonts = globals.styles.len(),
            "computed document statistics"
        );
        parsed.globals = globals;
    }
}

fn mode_key(hist: &HashMap<i64, usize>) -> Option<i64> {
    hist.iter()
        // Tie-break toward the smaller height for determinism.
        .max_by_key(|(&key, &count)| (count, -key))
        .map(|(&key, _)| key)
}

fn overall_mean(map: &HashMap<FontId, f32>) -> f32 {
    if map.is_empty() {
        return 1.0;
    }
    map.values().sum::<f32>() / map.len() as f32
}

/// Modal positive Y-delta between consecutive body-height runs with
/// non-empty text. A non-body run resets the running anchor so distances
/// never span headings or images.
fn body_distance(parsed: &ParseResult, body_height: f32) -> f32 {
    let mut hist: HashMap<i64, usize> = HashMap::new();

    for page in &parsed.pages {
        let mut anchor: Option<f32> = None;
        for item in &page.items {
            let PageItem::Run(run) = item else {
                anchor = None;
                continue;
            };
            if run.text.trim().is_empty() {
                continue;
            }
            if (run.height - body_height).abs() > BODY_HEIGHT_TOLERANCE {
                anchor = None;
                continue;
            }
            if let Some(prev_y) = anchor {
                let delta = prev_y - run.y;
                if delta > 0.0 {
                    *hist.entry(Globals::height_key(delta)).or_insert(0) += 1;
                }
            }
            anchor = Some(run.y);
        }
    }

    mode_key(&hist)
        .map(|k| k as f32 / 10.0)
        .unwrap_or(DEFAULT_BODY_DISTANCE)
}

/// Mean of `width / trimmed-length` per font, over body-height runs.
fn average_char_widths(parsed: &ParseResult, body_height: f32) -> HashMap<FontId, f32> {
    let mut sums: HashMap<FontId, (f32, usize)> = HashMap::new();

    for page in &parsed.pages {
        for item in &page.items {
            let PageItem::Run(run) = item else { continue };
            let len = run.text.trim().chars().count();
            if len == 0 || (run.height - body_height).abs() > BODY_HEIGHT_TOLERANCE {
                continue;
            }
            let entry = sums.entry(run.font_id.clone()).or_insert((0.0, 0));
            entry.0 += run.width / len as f32;
            entry.1 += 1;
        }
    }

    sums.into_iter()
        .map(|(font, (sum, count))| (font, sum / count as f32))
        .collect()
}

/// Weighted style confidence for one non-body font.
///
/// Components: font-descriptor weight/angle (0.40), average-width ratio
/// gated at 1.1 (0.35), raw relative width (0.20), name substrings
/// (0.05). Fonts with no descriptor fall back to name-only heuristics
/// for the descriptor component. The max-height font gets a weak bold
/// bonus so single-font documents still surface their display face.
fn style_confidence(globals: &Globals, font: &FontId, body_avg: f32) -> StyleConfidence {
    let descriptor = globals.fonts.get(font);
    let name = descriptor
        .map(|d| d.name.to_lowercase())
        .unwrap_or_else(|| font.to_lowercase());
    let name_bold = if name.contains("bold") { 1.0 } else { 0.0 };
    let name_italic = if name.contains("italic") || name.contains("oblique") {
        1.0
    } else {
        0.0
    };

    let weight = descriptor.and_then(|d| d.weight);
    let angle = descriptor.and_then(|d| d.italic_angle);
    let (desc_bold, desc_italic) = match (weight, angle) {
        // No descriptor data at all: degrade to the name signal.
        (None, None) => (name_bold, name_italic),
        _ => (
            if weight.unwrap_or(400) >= 600 { 1.0 } else { 0.0 },
            if angle.unwrap_or(0.0) != 0.0 { 1.0 } else { 0.0 },
        ),
    };

    let ratio = if body_avg > 0.0 {
        globals.avg_char_width.get(font).copied().unwrap_or(body_avg) / body_avg
    } else {
        1.0
    };
    let gated_width = ((ratio - 1.1) / 0.2).clamp(0.0, 1.0);
    let relative_width = ((ratio - 1.0) / 0.5).clamp(0.0, 1.0);

    let mut bold =
        0.40 * desc_bold + 0.35 * gated_width + 0.20 * relative_width + 0.05 * name_bold;
    let italic: f32 = 0.40 * desc_italic + 0.05 * name_italic;

    if *font == globals.max_height_font {
        bold += 0.1;
    }

    StyleConfidence {
        bold: bold.clamp(0.0, 1.0),
        italic: italic.clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FontDescriptor, FontFormat, PageContext, TextRun};

    fn run(x: f32, y: f32, text: &str, height: f32, font: &str) -> PageItem {
        PageItem::Run(TextRun {
            x,
            y,
            width: text.chars().count() as f32 * height / 2.0,
            height,
            text: text.to_string(),
            font_id: font.to_string(),
        })
    }

    fn parse_result(items: Vec<PageItem>) -> ParseResult {
        ParseResult {
            pages: vec![PageContext {
                index: 0,
                width: 612.0,
                height: 792.0,
                items,
            }],
            globals: Globals::default(),
        }
    }

    #[test]
    fn body_height_and_font_are_modes() {
        let mut parsed = parse_result(vec![
            run(72.0, 700.0, "Title", 24.0, "Display"),
            run(72.0, 670.0, "one", 12.0, "Body"),
            run(72.0, 656.0, "two", 12.0, "Body"),
            run(72.0, 642.0, "three", 12.0, "Body"),
        ]);
        ComputeGlobals.run(&mut parsed, &ConversionConfig::default());

        assert_eq!(parsed.globals.body_height, 12.0);
        assert_eq!(parsed.globals.body_font, "Body");
        assert_eq!(parsed.globals.max_height, 24.0);
        assert_eq!(parsed.globals.max_height_font, "Display");
    }

    #[test]
    fn body_distance_is_modal_line_gap() {
        let mut parsed = parse_result(vec![
            run(72.0, 700.0, "a", 12.0, "Body"),
            run(72.0, 686.0, "b", 12.0, "Body"),
            run(72.0, 672.0, "c", 12.0, "Body"),
            run(72.0, 658.0, "d", 12.0, "Body"),
            // A big jump appears once and must not win the mode.
            run(72.0, 600.0, "e", 12.0, "Body"),
            run(72.0, 586.0, "f", 12.0, "Body"),
        ]);
        ComputeGlobals.run(&mut parsed, &ConversionConfig::default());
        assert_eq!(parsed.globals.body_distance, 14.0);
    }

    #[test]
    fn heading_runs_reset_distance_anchor() {
        let mut parsed = parse_result(vec![
            run(72.0, 700.0, "a", 12.0, "Body"),
            run(72.0, 650.0, "Heading", 24.0, "Display"),
            run(72.0, 600.0, "b", 12.0, "Body"),
            run(72.0, 586.0, "c", 12.0, "Body"),
            run(72.0, 572.0, "d", 12.0, "Body"),
        ]);
        ComputeGlobals.run(&mut parsed, &ConversionConfig::default());
        // Without the reset the 100-unit gap across the heading would
        // pollute the histogram; the mode must be the 14-unit body gap.
        assert_eq!(parsed.globals.body_distance, 14.0);
    }

    #[test]
    fn body_font_has_zero_confidence() {
        let mut parsed = parse_result(vec![
            run(72.0, 700.0, "body body body", 12.0, "Body"),
            run(72.0, 686.0, "more body", 12.0, "Body"),
        ]);
        ComputeGlobals.run(&mut parsed, &ConversionConfig::default());
        let (confidence, format) = parsed.globals.styles["Body"];
        assert_eq!(confidence, StyleConfidence::default());
        assert_eq!(format, None);
    }

    #[test]
    fn descriptor_weight_drives_bold() {
        let mut parsed = parse_result(vec![
            run(72.0, 700.0, "plain", 12.0, "Body"),
            run(72.0, 686.0, "plain", 12.0, "Body"),
            run(72.0, 672.0, "strong", 12.0, "Heavy"),
        ]);
        parsed.globals.fonts.insert(
            "Heavy".into(),
            FontDescriptor {
                id: "Heavy".into(),
                name: "NotoSans-Bold".into(),
                weight: Some(700),
                italic_angle: Some(0.0),
            },
        );
        ComputeGlobals.run(&mut parsed, &ConversionConfig::default());

        let (confidence, format) = parsed.globals.styles["Heavy"];
        assert!(confidence.bold >= 0.4, "bold = {}", confidence.bold);
        assert_eq!(format, Some(FontFormat::Bold));
    }

    #[test]
    fn name_only_italic_detection_degrades_gracefully() {
        let mut parsed = parse_result(vec![
            run(72.0, 700.0, "plain", 12.0, "Body"),
            run(72.0, 686.0, "plain", 12.0, "Body"),
            run(72.0, 672.0, "slanted", 12.0, "Serif-Italic"),
        ]);
        // No descriptor registered for Serif-Italic.
        ComputeGlobals.run(&mut parsed, &ConversionConfig::default());
        let (confidence, format) = parsed.globals.styles["Serif-Italic"];
        assert!(confidence.italic >= 0.3, "italic = {}", confidence.italic);
        assert_eq!(format, Some(FontFormat::Italic));
    }

    #[test]
    fn empty_document_gets_defaults() {
        let mut parsed = ParseResult::default();
        ComputeGlobals.run(&mut parsed, &ConversionConfig::default());
        assert_eq!(parsed.globals.body_height, DEFAULT_BODY_HEIGHT);
        assert_eq!(parsed.globals.body_distance, DEFAULT_BODY_DISTANCE);
    }
}
