//! Wire representation of the remote OCR service's JSON response.
//!
//! Every numeric field is optional with a defined default so partial
//! responses degrade instead of failing the whole page. The parser in
//! [`super::parser`] normalizes this into [`crate::types::TextBlock`]s.

use serde::{Deserialize, Serialize};

/// Top-level OCR response: one entry per submitted page, in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrLayout {
    #[serde(default)]
    pub pages: Vec<OcrPage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrPage {
    #[serde(default)]
    pub blocks: Vec<OcrBlock>,
    /// Page width in points, when the service reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrBlock {
    #[serde(default)]
    pub lines: Vec<OcrLine>,
    /// Block-level box; the union of line boxes when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrLine {
    #[serde(default)]
    pub words: Vec<OcrWord>,
    /// Line-level box; the union of word boxes when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrWord {
    #[serde(default)]
    pub text: Option<String>,
    /// `[x, y, width, height]` in points, top-left origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    /// Recognition confidence in 0–1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<OcrFont>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrFont {
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    /// `[r, g, b]` with 0–255 components.
    #[serde(default)]
    pub color: Option<[u8; 3]>,
}
