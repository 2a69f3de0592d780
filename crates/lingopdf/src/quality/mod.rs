//! Post-hoc comparison of the original and reconstructed documents.
//!
//! Three coarse metrics, each with its own pass flag:
//! - text coverage: translated text length within an expected window of
//!   the original length;
//! - layout hash similarity: centroid-grid fingerprints detect gross
//!   rearrangement;
//! - font preservation: the reconstructed document still uses font
//!   families from the original (modulo standard-14 mapping).

use ahash::AHashSet;
use lopdf::{Document, Object};
use serde::Serialize;
use std::path::Path;
use tracing::warn;

use crate::Result;

/// Acceptance window for the text coverage ratio.
const DEFAULT_MIN_RATIO: f64 = 0.5;
const DEFAULT_MAX_RATIO: f64 = 2.5;
/// Grid resolution for the layout fingerprint (8×8 cells per page).
const GRID_CELLS: u32 = 8;
/// Layout similarity below this fails the layout check.
const LAYOUT_SIMILARITY_MIN: f64 = 0.5;

/// Thresholds for the quality gates.
#[derive(Debug, Clone)]
pub struct QualityThresholds {
    pub min_text_ratio: f64,
    pub max_text_ratio: f64,
    pub min_layout_similarity: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_text_ratio: DEFAULT_MIN_RATIO,
            max_text_ratio: DEFAULT_MAX_RATIO,
            min_layout_similarity: LAYOUT_SIMILARITY_MIN,
        }
    }
}

/// Outcome of the post-hoc comparison.
#[derive(Debug, Clone, Serialize)]
pub struct ReconstructionReport {
    pub text_coverage_ratio: f64,
    pub text_coverage_pass: bool,
    pub layout_hash_similarity: f64,
    pub layout_pass: bool,
    pub font_preservation_ratio: f64,
    pub font_pass: bool,
    pub warnings: Vec<String>,
}

impl ReconstructionReport {
    /// All individual gates passed.
    pub fn passed(&self) -> bool {
        self.text_coverage_pass && self.layout_pass && self.font_pass
    }
}

/// Compare an original document against its reconstruction.
pub fn validate_reconstruction(
    original_path: &Path,
    reconstructed_path: &Path,
    thresholds: &QualityThresholds,
) -> Result<ReconstructionReport> {
    let original = Document::load(original_path)?;
    let reconstructed = Document::load(reconstructed_path)?;
    Ok(compare_documents(&original, &reconstructed, thresholds))
}

fn compare_documents(
    original: &Document,
    reconstructed: &Document,
    thresholds: &QualityThresholds,
) -> ReconstructionReport {
    let mut warnings = Vec::new();

    let original_text = document_text(original, &mut warnings);
    let reconstructed_text = document_text(reconstructed, &mut warnings);

    let text_coverage_ratio = if original_text.is_empty() {
        warnings.push("original document yielded no text; coverage not comparable".to_string());
        1.0
    } else {
        reconstructed_text.chars().count() as f64 / original_text.chars().count() as f64
    };
    let text_coverage_pass = text_coverage_ratio >= thresholds.min_text_ratio
        && text_coverage_ratio <= thresholds.max_text_ratio;

    let layout_hash_similarity = layout_similarity(original, reconstructed);
    let layout_pass = layout_hash_similarity >= thresholds.min_layout_similarity;

    let original_fonts = font_families(original);
    let reconstructed_fonts = font_families(reconstructed);
    let font_preservation_ratio = if original_fonts.is_empty() {
        1.0
    } else {
        original_fonts.intersection(&reconstructed_fonts).count() as f64
            / original_fonts.len() as f64
    };
    let font_pass = font_preservation_ratio > 0.0 || original_fonts.is_empty();

    ReconstructionReport {
        text_coverage_ratio,
        text_coverage_pass,
        layout_hash_similarity,
        layout_pass,
        font_preservation_ratio,
        font_pass,
        warnings,
    }
}

/// Layered text extraction: the direct extractor first, then a raw
/// content-stream scan; pages that defeat both are skipped with a
/// warning rather than failing the comparison.
fn document_text(doc: &Document, warnings: &mut Vec<String>) -> String {
    let mut text = String::new();
    for (page_number, _) in doc.get_pages() {
        match doc.extract_text(&[page_number]) {
            Ok(extracted) if !extracted.trim().is_empty() => text.push_str(&extracted),
            _ => match scan_text_operators(doc, page_number) {
                Some(scanned) if !scanned.trim().is_empty() => text.push_str(&scanned),
                _ => {
                    warn!(page = page_number, "no text extractable from page");
                    warnings.push(format!("page {page_number}: text extraction failed"));
                }
            },
        }
    }
    text
}

/// Fallback extractor: walk content-stream operations and collect the
/// string operands of Tj/TJ shows.
fn scan_text_operators(doc: &Document, page_number: u32) -> Option<String> {
    let page_id = *doc.get_pages().get(&page_number)?;
    let data = doc.get_page_content(page_id).ok()?;
    let content = lopdf::content::Content::decode(&data).ok()?;

    let mut out = String::new();
    for op in content.operations {
        match op.operator.as_str() {
            "Tj" => {
                for operand in &op.operands {
                    if let Object::String(bytes, _) = operand {
                        out.push_str(&String::from_utf8_lossy(bytes));
                        out.push(' ');
                    }
                }
            }
            "TJ" => {
                for operand in &op.operands {
                    if let Object::Array(parts) = operand {
                        for part in parts {
                            if let Object::String(bytes, _) = part {
                                out.push_str(&String::from_utf8_lossy(bytes));
                            }
                        }
                        out.push(' ');
                    }
                }
            }
            _ => {}
        }
    }
    Some(out)
}

/// Similarity of the two documents' centroid grids, averaged per page.
fn layout_similarity(original: &Document, reconstructed: &Document) -> f64 {
    let original_pages: Vec<u64> = page_fingerprints(original);
    let reconstructed_pages: Vec<u64> = page_fingerprints(reconstructed);

    if original_pages.is_empty() && reconstructed_pages.is_empty() {
        return 1.0;
    }

    let pages = original_pages.len().max(reconstructed_pages.len());
    let mut total = 0.0;
    for index in 0..pages {
        let a = original_pages.get(index).copied().unwrap_or(0);
        let b = reconstructed_pages.get(index).copied().unwrap_or(0);
        total += grid_similarity(a, b);
    }
    total / pages as f64
}

/// Fingerprint one page: each text-positioning operation sets the grid
/// cell its start point falls into.
fn page_fingerprints(doc: &Document) -> Vec<u64> {
    let mut fingerprints = Vec::new();
    for page_id in doc.get_pages().into_values() {
        let (width, height) = page_size(doc, page_id).unwrap_or((612.0, 792.0));
        let mut grid: u64 = 0;

        let decoded = doc
            .get_page_content(page_id)
            .ok()
            .and_then(|data| lopdf::content::Content::decode(&data).ok());
        if let Some(content) = decoded {
            for op in content.operations {
                let (x, y) = match op.operator.as_str() {
                    "Td" | "TD" if op.operands.len() >= 2 => {
                        match (number(&op.operands[0]), number(&op.operands[1])) {
                            (Some(x), Some(y)) => (x, y),
                            _ => continue,
                        }
                    }
                    "Tm" if op.operands.len() >= 6 => {
                        match (number(&op.operands[4]), number(&op.operands[5])) {
                            (Some(x), Some(y)) => (x, y),
                            _ => continue,
                        }
                    }
                    _ => continue,
                };

                let col = ((x / width) * f64::from(GRID_CELLS)).clamp(0.0, f64::from(GRID_CELLS - 1)) as u32;
                let row = ((y / height) * f64::from(GRID_CELLS)).clamp(0.0, f64::from(GRID_CELLS - 1)) as u32;
                grid |= 1u64 << (row * GRID_CELLS + col);
            }
        }

        fingerprints.push(grid);
    }
    fingerprints
}

fn grid_similarity(a: u64, b: u64) -> f64 {
    let union = (a | b).count_ones();
    if union == 0 {
        return 1.0;
    }
    (a & b).count_ones() as f64 / union as f64
}

fn page_size(doc: &Document, page_id: lopdf::ObjectId) -> Option<(f64, f64)> {
    let page = doc.get_object(page_id).ok()?.as_dict().ok()?;
    let media_box = match page.get(b"MediaBox") {
        Ok(Object::Array(arr)) => arr.clone(),
        Ok(Object::Reference(id)) => doc.get_object(*id).ok()?.as_array().ok()?.clone(),
        _ => return None,
    };
    if media_box.len() != 4 {
        return None;
    }
    let values: Vec<f64> = media_box.iter().filter_map(number).collect();
    if values.len() != 4 {
        return None;
    }
    Some((values[2] - values[0], values[3] - values[1]))
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Canonical family root for font comparison: subset prefixes
/// (`ABCDEF+`) and style suffixes (`-Bold`) are stripped.
fn normalize_family(name: &str) -> String {
    let name = name.rsplit_once('+').map_or(name, |(_, rest)| rest);
    let name = name.split_once('-').map_or(name, |(base, _)| base);
    name.to_lowercase()
}

fn font_families(doc: &Document) -> AHashSet<String> {
    let mut families = AHashSet::new();
    for (_, object) in doc.objects.iter() {
        let Ok(dict) = object.as_dict() else { continue };
        let is_font = dict
            .get(b"Type")
            .ok()
            .and_then(|t| t.as_name().ok())
            .is_some_and(|n| n == b"Font".as_slice());
        if !is_font {
            continue;
        }
        if let Ok(base_font) = dict.get(b"BaseFont")
            && let Ok(name) = base_font.as_name()
        {
            families.insert(normalize_family(&String::from_utf8_lossy(name)));
        }
    }
    families
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::PdfReconstructor;
    use crate::types::{BoundingBox, FontInfo, TranslatedElement, TranslatedLayout, TranslatedPage};
    use tempfile::TempDir;

    fn build_pdf(dir: &TempDir, name: &str, texts: &[(&str, f64, f64)]) -> std::path::PathBuf {
        let mut page = TranslatedPage::new(1).with_dimensions(612.0, 792.0);
        for (text, x, y) in texts {
            page.elements.push(TranslatedElement {
                original_text: text.to_string(),
                translated_text: text.to_string(),
                adjusted_text: text.to_string(),
                bbox: BoundingBox::new(*x, *y, 200.0, 20.0),
                font_info: FontInfo::new("Helvetica", 12.0),
                layout_strategy_name: "none".into(),
                confidence: 1.0,
            });
        }
        let layout = TranslatedLayout { pages: vec![page] };
        let path = dir.path().join(name);
        PdfReconstructor::default().reconstruct(&layout, &path).unwrap();
        path
    }

    #[test]
    fn test_identical_documents_pass() {
        let dir = TempDir::new().unwrap();
        let texts = [("Hello world from page one", 72.0, 72.0), ("More text", 72.0, 200.0)];
        let a = build_pdf(&dir, "a.pdf", &texts);
        let b = build_pdf(&dir, "b.pdf", &texts);

        let report = validate_reconstruction(&a, &b, &QualityThresholds::default()).unwrap();
        assert!(report.text_coverage_pass, "coverage: {}", report.text_coverage_ratio);
        assert!(report.layout_pass, "layout: {}", report.layout_hash_similarity);
        assert!(report.font_pass);
        assert!(report.passed());
        assert!((report.font_preservation_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_translation_length_within_window_passes() {
        let dir = TempDir::new().unwrap();
        let a = build_pdf(&dir, "a.pdf", &[("ten chars!", 72.0, 72.0)]);
        let b = build_pdf(&dir, "b.pdf", &[("roughly twice as long!", 72.0, 72.0)]);

        let report = validate_reconstruction(&a, &b, &QualityThresholds::default()).unwrap();
        assert!(report.text_coverage_pass);
        assert!(report.text_coverage_ratio > 1.0);
    }

    #[test]
    fn test_dropped_text_fails_coverage() {
        let dir = TempDir::new().unwrap();
        let a = build_pdf(
            &dir,
            "a.pdf",
            &[("a long paragraph of source text that matters a great deal", 72.0, 72.0)],
        );
        let b = build_pdf(&dir, "b.pdf", &[("tiny", 72.0, 72.0)]);

        let report = validate_reconstruction(&a, &b, &QualityThresholds::default()).unwrap();
        assert!(!report.text_coverage_pass);
    }

    #[test]
    fn test_rearranged_layout_detected() {
        let dir = TempDir::new().unwrap();
        let a = build_pdf(
            &dir,
            "a.pdf",
            &[("top left", 10.0, 10.0), ("also top", 10.0, 40.0)],
        );
        let b = build_pdf(
            &dir,
            "b.pdf",
            &[("top left", 400.0, 700.0), ("also top", 450.0, 760.0)],
        );

        let report = validate_reconstruction(&a, &b, &QualityThresholds::default()).unwrap();
        assert!(report.layout_hash_similarity < 0.5);
        assert!(!report.layout_pass);
    }

    #[test]
    fn test_grid_similarity_edges() {
        assert_eq!(grid_similarity(0, 0), 1.0);
        assert_eq!(grid_similarity(0b1111, 0b1111), 1.0);
        assert_eq!(grid_similarity(0b1100, 0b0011), 0.0);
        assert!((grid_similarity(0b1110, 0b0111) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_family() {
        assert_eq!(normalize_family("ABCDEF+Arial-Bold"), "arial");
        assert_eq!(normalize_family("Helvetica-BoldOblique"), "helvetica");
        assert_eq!(normalize_family("Times-Roman"), "times");
        assert_eq!(normalize_family("Courier"), "courier");
    }
}
