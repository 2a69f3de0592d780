//! Normalization of raw OCR responses into text blocks.
//!
//! Rules:
//! - words within a line join with a single space, lines within a block
//!   join with a newline;
//! - a block's box is the union of its lines' boxes, never its words',
//!   to avoid kerning jitter;
//! - a block's font comes from its first non-empty word, color defaults
//!   to black;
//! - empty and whitespace-only blocks are discarded;
//! - degenerate box extents are clamped up to 1 pt.

use crate::types::{BoundingBox, FontInfo, FontStyle, FontWeight, RgbColor, TextBlock};

use super::wire::{OcrBlock, OcrFont, OcrLayout, OcrLine, OcrWord};

/// Minimum extent for a parsed bounding box, in points.
const MIN_EXTENT_PT: f64 = 1.0;

/// Parse a full OCR response into per-page text blocks; the outer vector
/// is indexed by page in submission order.
pub fn parse_layout(layout: &OcrLayout) -> Vec<Vec<TextBlock>> {
    layout.pages.iter().map(parse_page).collect()
}

fn parse_page(page: &super::wire::OcrPage) -> Vec<TextBlock> {
    page.blocks.iter().filter_map(parse_block).collect()
}

fn parse_block(block: &OcrBlock) -> Option<TextBlock> {
    let text = block
        .lines
        .iter()
        .map(line_text)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if text.trim().is_empty() {
        return None;
    }

    let bbox = block_bbox(block)?.with_min_extent(MIN_EXTENT_PT);
    let font = block_font(block);
    let confidence = block_confidence(block);

    let mut parsed = TextBlock::new(text, bbox, font);
    if let Some(confidence) = confidence {
        parsed = parsed.with_confidence(confidence);
    }
    Some(parsed)
}

fn line_text(line: &OcrLine) -> String {
    line.words
        .iter()
        .filter_map(|w| w.text.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn bbox_from_raw(raw: [f64; 4]) -> BoundingBox {
    BoundingBox::new(raw[0], raw[1], raw[2], raw[3])
}

/// A line's box: its own when present, else the union of its words'.
fn line_bbox(line: &OcrLine) -> Option<BoundingBox> {
    if let Some(raw) = line.bbox {
        return Some(bbox_from_raw(raw));
    }
    let mut boxes = line.words.iter().filter_map(|w| w.bbox.map(bbox_from_raw));
    let first = boxes.next()?;
    Some(boxes.fold(first, |acc, b| acc.union(&b)))
}

/// A block's box: its own when present, else the union of its lines'.
fn block_bbox(block: &OcrBlock) -> Option<BoundingBox> {
    if let Some(raw) = block.bbox {
        return Some(bbox_from_raw(raw));
    }
    let mut boxes = block.lines.iter().filter_map(line_bbox);
    let first = boxes.next()?;
    Some(boxes.fold(first, |acc, b| acc.union(&b)))
}

fn first_word(block: &OcrBlock) -> Option<&OcrWord> {
    block
        .lines
        .iter()
        .flat_map(|l| l.words.iter())
        .find(|w| w.text.as_deref().is_some_and(|t| !t.trim().is_empty()))
}

fn block_font(block: &OcrBlock) -> FontInfo {
    first_word(block)
        .and_then(|w| w.font.as_ref())
        .map(font_from_wire)
        .unwrap_or_default()
}

fn font_from_wire(wire: &OcrFont) -> FontInfo {
    FontInfo {
        family: wire
            .family
            .clone()
            .unwrap_or_else(|| FontInfo::DEFAULT_FAMILY.to_string()),
        size: wire.size.unwrap_or(12.0),
        weight: match wire.weight.as_deref() {
            Some("bold") => FontWeight::Bold,
            _ => FontWeight::Normal,
        },
        style: match wire.style.as_deref() {
            Some("italic") => FontStyle::Italic,
            _ => FontStyle::Normal,
        },
        color: wire
            .color
            .map(|[r, g, b]| RgbColor::new(r, g, b))
            .unwrap_or(RgbColor::BLACK),
    }
}

/// Mean recognition confidence over words that reported one.
fn block_confidence(block: &OcrBlock) -> Option<f64> {
    let confidences: Vec<f64> = block
        .lines
        .iter()
        .flat_map(|l| l.words.iter())
        .filter_map(|w| w.confidence)
        .collect();
    if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::wire::OcrPage;

    fn word(text: &str, bbox: [f64; 4]) -> OcrWord {
        OcrWord {
            text: Some(text.to_string()),
            bbox: Some(bbox),
            confidence: None,
            font: None,
        }
    }

    #[test]
    fn test_words_join_with_space_lines_with_newline() {
        let block = OcrBlock {
            lines: vec![
                OcrLine {
                    words: vec![word("Hello", [0.0, 0.0, 30.0, 12.0]), word("world", [32.0, 0.0, 30.0, 12.0])],
                    bbox: None,
                },
                OcrLine {
                    words: vec![word("again", [0.0, 14.0, 30.0, 12.0])],
                    bbox: None,
                },
            ],
            bbox: None,
        };
        let parsed = parse_block(&block).unwrap();
        assert_eq!(parsed.text, "Hello world\nagain");
    }

    #[test]
    fn test_block_bbox_is_union_of_line_boxes() {
        let block = OcrBlock {
            lines: vec![
                OcrLine {
                    words: vec![word("a", [5.0, 5.0, 10.0, 10.0])],
                    bbox: Some([0.0, 0.0, 50.0, 12.0]),
                },
                OcrLine {
                    words: vec![word("b", [5.0, 20.0, 10.0, 10.0])],
                    bbox: Some([0.0, 14.0, 40.0, 12.0]),
                },
            ],
            bbox: None,
        };
        let parsed = parse_block(&block).unwrap();
        // Union of the line boxes, ignoring the narrower word boxes.
        assert_eq!(parsed.bbox, BoundingBox::new(0.0, 0.0, 50.0, 26.0));
    }

    #[test]
    fn test_whitespace_only_blocks_discarded() {
        let block = OcrBlock {
            lines: vec![OcrLine {
                words: vec![word("   ", [0.0, 0.0, 10.0, 10.0])],
                bbox: None,
            }],
            bbox: None,
        };
        assert!(parse_block(&block).is_none());
    }

    #[test]
    fn test_degenerate_extent_clamped() {
        let block = OcrBlock {
            lines: vec![OcrLine {
                words: vec![word("x", [0.0, 0.0, 0.0, -2.0])],
                bbox: None,
            }],
            bbox: None,
        };
        let parsed = parse_block(&block).unwrap();
        assert_eq!(parsed.bbox.width, 1.0);
        assert_eq!(parsed.bbox.height, 1.0);
    }

    #[test]
    fn test_font_from_first_nonempty_word() {
        let first = OcrWord {
            text: Some("  ".to_string()),
            bbox: Some([0.0, 0.0, 5.0, 5.0]),
            confidence: None,
            font: Some(OcrFont {
                family: Some("Courier".to_string()),
                ..Default::default()
            }),
        };
        let second = OcrWord {
            text: Some("real".to_string()),
            bbox: Some([6.0, 0.0, 20.0, 10.0]),
            confidence: Some(0.9),
            font: Some(OcrFont {
                family: Some("Times".to_string()),
                size: Some(10.0),
                weight: Some("bold".to_string()),
                style: None,
                color: None,
            }),
        };
        let block = OcrBlock {
            lines: vec![OcrLine {
                words: vec![first, second],
                bbox: None,
            }],
            bbox: None,
        };
        let parsed = parse_block(&block).unwrap();
        assert_eq!(parsed.font.family, "Times");
        assert_eq!(parsed.font.weight, FontWeight::Bold);
        assert_eq!(parsed.font.color, RgbColor::BLACK);
    }

    #[test]
    fn test_confidence_is_mean_of_reported() {
        let mut a = word("a", [0.0, 0.0, 5.0, 5.0]);
        a.confidence = Some(0.8);
        let mut b = word("b", [6.0, 0.0, 5.0, 5.0]);
        b.confidence = Some(0.6);
        let block = OcrBlock {
            lines: vec![OcrLine {
                words: vec![a, b, word("c", [12.0, 0.0, 5.0, 5.0])],
                bbox: None,
            }],
            bbox: None,
        };
        let parsed = parse_block(&block).unwrap();
        assert!((parsed.ocr_confidence.unwrap() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_pages_keep_submission_order() {
        let layout = OcrLayout {
            pages: vec![
                OcrPage {
                    blocks: vec![OcrBlock {
                        lines: vec![OcrLine {
                            words: vec![word("page1", [0.0, 0.0, 30.0, 10.0])],
                            bbox: None,
                        }],
                        bbox: None,
                    }],
                    width: None,
                    height: None,
                },
                OcrPage::default(),
                OcrPage {
                    blocks: vec![OcrBlock {
                        lines: vec![OcrLine {
                            words: vec![word("page3", [0.0, 0.0, 30.0, 10.0])],
                            bbox: None,
                        }],
                        bbox: None,
                    }],
                    width: None,
                    height: None,
                },
            ],
        };
        let pages = parse_layout(&layout);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0][0].text, "page1");
        assert!(pages[1].is_empty());
        assert_eq!(pages[2][0].text, "page3");
    }
}
