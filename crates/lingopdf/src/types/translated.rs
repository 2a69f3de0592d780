//! Output of the layout-aware translation stage.

use serde::{Deserialize, Serialize};

use super::geometry::{BoundingBox, FontInfo};

/// A single translated text element, positioned for reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedElement {
    pub original_text: String,
    /// Raw translation service output.
    pub translated_text: String,
    /// Text after layout adjustment (wrapping, truncation).
    pub adjusted_text: String,
    pub bbox: BoundingBox,
    pub font_info: FontInfo,
    /// Name of the layout strategy applied (`none`, `font_scale`,
    /// `text_wrap`, `hybrid`).
    pub layout_strategy_name: String,
    /// Layout quality score in 0–1.
    pub confidence: f64,
}

/// All translated elements of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedPage {
    /// 1-indexed page number.
    pub page_number: usize,
    pub elements: Vec<TranslatedElement>,
    /// Original page width in points, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Original page height in points, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl TranslatedPage {
    pub fn new(page_number: usize) -> Self {
        Self {
            page_number,
            elements: Vec::new(),
            width: None,
            height: None,
        }
    }

    pub fn with_dimensions(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Bounding union of all element boxes; used when the original page
    /// dimensions are unknown.
    pub fn content_bounds(&self) -> Option<BoundingBox> {
        let mut iter = self.elements.iter().map(|e| e.bbox);
        let first = iter.next()?;
        Some(iter.fold(first, |acc, b| acc.union(&b)))
    }
}

/// The whole translated document; owns its pages and elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslatedLayout {
    pub pages: Vec<TranslatedPage>,
}

impl TranslatedLayout {
    pub fn element_count(&self) -> usize {
        self.pages.iter().map(|p| p.elements.len()).sum()
    }
}
