//! The fundamental OCR output unit.

use serde::{Deserialize, Serialize};

use super::geometry::{BoundingBox, FontInfo};

/// A block of recognized text with its position and font.
///
/// Created by the OCR parser, read by the translator and the
/// reconstructor; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub bbox: BoundingBox,
    pub font: FontInfo,
    /// Recognition confidence in 0–1, when the OCR service reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_confidence: Option<f64>,
}

impl TextBlock {
    pub fn new(text: impl Into<String>, bbox: BoundingBox, font: FontInfo) -> Self {
        Self {
            text: text.into(),
            bbox,
            font,
            ocr_confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.ocr_confidence = Some(confidence);
        self
    }

    /// Character count used by the fit analysis.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_count_is_chars_not_bytes() {
        let block = TextBlock::new(
            "Größe",
            BoundingBox::new(0.0, 0.0, 100.0, 20.0),
            FontInfo::default(),
        );
        assert_eq!(block.char_count(), 5);
        assert!(block.text.len() > 5);
    }

    #[test]
    fn test_confidence_builder() {
        let block = TextBlock::new("x", BoundingBox::new(0.0, 0.0, 1.0, 1.0), FontInfo::default())
            .with_confidence(0.93);
        assert_eq!(block.ocr_confidence, Some(0.93));
    }
}
