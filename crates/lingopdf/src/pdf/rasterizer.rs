//! Page rasterization via pdfium.
//!
//! Rendering happens on the blocking pool and every page is spilled to a
//! temporary file immediately, so the in-memory working set stays bounded
//! by a single page regardless of document length. Pages are read back on
//! demand in document order.

use async_trait::async_trait;
use image::ImageFormat;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

use crate::{LingoError, Result};

/// Output image encoding. PNG is lossless and the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    #[default]
    Png,
    Jpeg,
}

impl RasterFormat {
    fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// Rendering parameters.
#[derive(Debug, Clone)]
pub struct RasterOptions {
    /// Render resolution; must lie in 72–600.
    pub dpi: u32,
    pub format: RasterFormat,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            dpi: 300,
            format: RasterFormat::Png,
        }
    }
}

/// One rendered page spilled to disk.
#[derive(Debug)]
struct RasterPage {
    path: PathBuf,
    width_pt: f64,
    height_pt: f64,
}

/// Rendered pages of one document, backed by a temporary directory that
/// is removed when this value drops.
#[derive(Debug)]
pub struct RasterizedPages {
    _temp_dir: TempDir,
    pages: Vec<RasterPage>,
}

impl RasterizedPages {
    /// Assemble from already-rendered page files.
    ///
    /// Used by alternative rasterizer backends; `pages` pairs each file
    /// with its page dimensions in points, in document order.
    pub fn from_files(temp_dir: TempDir, pages: Vec<(PathBuf, (f64, f64))>) -> Self {
        Self {
            _temp_dir: temp_dir,
            pages: pages
                .into_iter()
                .map(|(path, (width_pt, height_pt))| RasterPage {
                    path,
                    width_pt,
                    height_pt,
                })
                .collect(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Original page dimensions in points, indexed from 0.
    pub fn page_dimensions(&self, index: usize) -> Option<(f64, f64)> {
        self.pages.get(index).map(|p| (p.width_pt, p.height_pt))
    }

    /// Read one page's image bytes back from disk.
    pub async fn read_page(&self, index: usize) -> Result<Vec<u8>> {
        let page = self.pages.get(index).ok_or_else(|| LingoError::NotFound {
            what: format!("rasterized page {index}"),
        })?;
        Ok(tokio::fs::read(&page.path).await?)
    }

    /// Read all pages in document order.
    ///
    /// Convenience for the OCR submission path, which needs the whole
    /// batch at once; per-page readers should use `read_page`.
    pub async fn read_all(&self) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::with_capacity(self.pages.len());
        for index in 0..self.pages.len() {
            out.push(self.read_page(index).await?);
        }
        Ok(out)
    }
}

/// Seam over the rasterization backend so the pipeline can run against
/// fixtures in tests.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn rasterize(&self, path: &Path, options: &RasterOptions) -> Result<RasterizedPages>;
}

/// pdfium-backed rasterizer.
#[derive(Debug, Default)]
pub struct PdfiumRasterizer;

#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    async fn rasterize(&self, path: &Path, options: &RasterOptions) -> Result<RasterizedPages> {
        if !(72..=600).contains(&options.dpi) {
            return Err(LingoError::invalid_input(format!(
                "DPI {} is outside the supported range 72-600",
                options.dpi
            )));
        }

        let path = path.to_path_buf();
        let options = options.clone();
        tokio::task::spawn_blocking(move || render_document(&path, &options))
            .await
            .map_err(|e| LingoError::internal(format!("rasterization task failed: {e}")))?
    }
}

/// Blocking pdfium render of all pages; one page in memory at a time.
fn render_document(path: &Path, options: &RasterOptions) -> Result<RasterizedPages> {
    let pdfium = Pdfium::new(
        Pdfium::bind_to_system_library()
            .map_err(|e| LingoError::internal(format!("pdfium unavailable: {e:?}")))?,
    );

    let document = pdfium.load_pdf_from_file(path, None).map_err(map_pdfium_error)?;

    let temp_dir = tempfile::tempdir()?;
    let scale = options.dpi as f32 / 72.0;
    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

    let mut pages = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let width_pt = f64::from(page.width().value);
        let height_pt = f64::from(page.height().value);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(map_pdfium_error)?;
        let image = match options.format {
            // JPEG has no alpha channel; flatten before encoding.
            RasterFormat::Jpeg => image::DynamicImage::ImageRgb8(bitmap.as_image().to_rgb8()),
            RasterFormat::Png => bitmap.as_image(),
        };

        let mut encoded = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut encoded), options.format.image_format())
            .map_err(|e| LingoError::internal(format!("failed to encode page {index}: {e}")))?;

        let page_path = temp_dir
            .path()
            .join(format!("page-{index:04}.{}", options.format.extension()));
        std::fs::write(&page_path, &encoded)?;

        debug!(page = index, bytes = encoded.len(), "rasterized page");
        pages.push(RasterPage {
            path: page_path,
            width_pt,
            height_pt,
        });
    }

    Ok(RasterizedPages {
        _temp_dir: temp_dir,
        pages,
    })
}

/// pdfium reports password-protected documents through its internal error
/// type; everything else counts as corruption.
fn map_pdfium_error(err: PdfiumError) -> LingoError {
    let detail = format!("{err:?}");
    if detail.contains("Password") {
        LingoError::Encrypted
    } else {
        LingoError::Corrupted { message: detail }
    }
}
