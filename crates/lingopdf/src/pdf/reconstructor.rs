//! Reconstruction of a translated document as a fresh PDF.
//!
//! # Coordinate System
//!
//! Bounding boxes arrive with a top-left origin (the OCR convention);
//! PDF pages use a bottom-left origin. Each drawn line converts with
//! `pdf_y = page_height - top_y - baseline_offset`.
//!
//! Text is drawn as true text objects with standard-14 fonts, so the
//! output stays searchable and PDF/A-friendly. Families the standard set
//! cannot express fall back to Helvetica variants and are counted.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, StringFormat};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::core::config::LayoutConfig;
use crate::pdf::fonts;
use crate::types::{TranslatedLayout, TranslatedPage};
use crate::{LingoError, Result};

/// US Letter, used when a page reports no dimensions and has no elements.
const DEFAULT_PAGE_SIZE: (f64, f64) = (612.0, 792.0);

/// Render-time metrics for one reconstruction run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RenderStats {
    /// Fraction of elements whose text overflowed its box height and was
    /// truncated at render time.
    pub overflow_rate: f64,
    /// Fraction of elements whose font family fell back to Helvetica.
    pub font_fallback_rate: f64,
    pub warnings: Vec<String>,
}

/// Builds the output PDF from a translated layout.
#[derive(Debug, Clone, Default)]
pub struct PdfReconstructor {
    layout_config: LayoutConfig,
}

impl PdfReconstructor {
    pub fn new(layout_config: LayoutConfig) -> Self {
        Self { layout_config }
    }

    /// Write `layout` to `out_path` and report render metrics.
    pub fn reconstruct(&self, layout: &TranslatedLayout, out_path: &Path) -> Result<RenderStats> {
        if layout.pages.is_empty() {
            return Err(LingoError::invalid_input("translated layout has no pages"));
        }

        let mut doc = Document::with_version("1.5");
        let pages_tree_id = doc.new_object_id();

        // One font dictionary per base font, shared across pages.
        let mut font_ids: BTreeMap<&'static str, lopdf::ObjectId> = BTreeMap::new();

        let mut stats = Counters::default();
        let mut page_ids = Vec::with_capacity(layout.pages.len());

        for page in &layout.pages {
            let page_id = self.render_page(&mut doc, pages_tree_id, page, &mut font_ids, &mut stats)?;
            page_ids.push(page_id);
        }

        let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();
        let pages_dict = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(page_ids.len() as i64)),
        ]);
        doc.objects.insert(pages_tree_id, Object::Dictionary(pages_dict));

        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_tree_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        doc.compress();
        doc.save(out_path)?;

        let total = layout.element_count().max(1) as f64;
        info!(
            pages = layout.pages.len(),
            elements = layout.element_count(),
            overflows = stats.overflow_events,
            fallbacks = stats.fallback_events,
            "reconstructed document"
        );

        Ok(RenderStats {
            overflow_rate: stats.overflow_events as f64 / total,
            font_fallback_rate: stats.fallback_events as f64 / total,
            warnings: stats.warnings,
        })
    }

    fn render_page(
        &self,
        doc: &mut Document,
        pages_tree_id: lopdf::ObjectId,
        page: &TranslatedPage,
        font_ids: &mut BTreeMap<&'static str, lopdf::ObjectId>,
        stats: &mut Counters,
    ) -> Result<lopdf::ObjectId> {
        let (page_width, page_height) = page_dimensions(page);

        let mut operations = vec![Operation::new("q", vec![])];
        let mut used_fonts: BTreeMap<&'static str, String> = BTreeMap::new();

        for element in &page.elements {
            let resolved = fonts::resolve(
                &element.font_info.family,
                element.font_info.weight,
                element.font_info.style,
            );
            if resolved.is_fallback {
                stats.fallback_events += 1;
            }
            let next_font_index = used_fonts.len() + 1;
            let font_key = used_fonts
                .entry(resolved.base_font)
                .or_insert_with(|| format!("F{}", next_font_index))
                .clone();

            let font_size = element.font_info.size;
            let line_height = font_size * self.layout_config.line_height_factor;
            let mut lines: Vec<&str> = element.adjusted_text.split('\n').collect();

            // Final guard against text taller than its adjusted box.
            let fitting = ((element.bbox.height / line_height).floor() as usize).max(1);
            if lines.len() > fitting {
                warn!(
                    page = page.page_number,
                    lines = lines.len(),
                    fitting,
                    "element overflows its box at render time, truncating"
                );
                lines.truncate(fitting);
                stats.overflow_events += 1;
            }

            let (r, g, b) = element.font_info.color.to_unit();
            operations.push(Operation::new(
                "rg",
                vec![real(r), real(g), real(b)],
            ));

            for (line_index, line) in lines.iter().enumerate() {
                if line.is_empty() {
                    continue;
                }
                let top_y = element.bbox.y + font_size + line_index as f64 * line_height;
                let pdf_y = page_height - top_y;

                let (encoded, lossy) = encode_win_ansi(line);
                if lossy {
                    stats.push_warning(format!(
                        "page {}: characters outside WinAnsi were replaced",
                        page.page_number
                    ));
                }

                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new(
                    "Tf",
                    vec![Object::Name(font_key.as_bytes().to_vec()), real(font_size)],
                ));
                operations.push(Operation::new(
                    "Td",
                    vec![real(element.bbox.x), real(pdf_y)],
                ));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(encoded, StringFormat::Literal)],
                ));
                operations.push(Operation::new("ET", vec![]));
            }
        }

        operations.push(Operation::new("Q", vec![]));

        let content = Content { operations };
        let content_bytes = content
            .encode()
            .map_err(|e| LingoError::internal(format!("failed to encode content stream: {e}")))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content_bytes));

        let mut font_resources = Dictionary::new();
        for (base_font, key) in &used_fonts {
            let font_id = *font_ids
                .entry(base_font)
                .or_insert_with(|| add_standard_font(doc, base_font));
            font_resources.set(key.as_bytes().to_vec(), Object::Reference(font_id));
        }
        let resources_id = doc.add_object(Dictionary::from_iter([(
            "Font",
            Object::Dictionary(font_resources),
        )]));

        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_tree_id)),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Reference(resources_id)),
            (
                "MediaBox",
                Object::Array(vec![0.into(), 0.into(), real(page_width), real(page_height)]),
            ),
        ]));

        Ok(page_id)
    }
}

#[derive(Debug, Default)]
struct Counters {
    overflow_events: usize,
    fallback_events: usize,
    warnings: Vec<String>,
}

impl Counters {
    /// Warnings deduplicate; a thousand lossy lines produce one entry.
    fn push_warning(&mut self, warning: String) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn page_dimensions(page: &TranslatedPage) -> (f64, f64) {
    if let (Some(width), Some(height)) = (page.width, page.height) {
        return (width, height);
    }
    match page.content_bounds() {
        Some(bounds) => (bounds.x + bounds.width, bounds.y + bounds.height),
        None => DEFAULT_PAGE_SIZE,
    }
}

fn add_standard_font(doc: &mut Document, base_font: &str) -> lopdf::ObjectId {
    let mut dict = Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(base_font.as_bytes().to_vec())),
    ]);
    // Symbolic fonts carry their built-in encodings.
    if base_font != "Symbol" && base_font != "ZapfDingbats" {
        dict.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    }
    doc.add_object(dict)
}

/// Encode text for a WinAnsi single-byte string literal.
///
/// Characters outside Latin-1 become `?`; the second return value flags
/// that lossy replacement happened.
fn encode_win_ansi(text: &str) -> (Vec<u8>, bool) {
    let mut lossy = false;
    let bytes = text
        .chars()
        .map(|c| {
            let code = c as u32;
            if code <= 0xFF {
                code as u8
            } else {
                lossy = true;
                b'?'
            }
        })
        .collect();
    (bytes, lossy)
}
