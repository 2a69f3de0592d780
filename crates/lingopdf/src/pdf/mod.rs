//! PDF-side components: input validation, rasterization, font fallback,
//! and output reconstruction.

pub mod fonts;
mod rasterizer;
mod reconstructor;
mod validator;

pub use fonts::ResolvedFont;
pub use rasterizer::{
    PageRasterizer, PdfiumRasterizer, RasterFormat, RasterOptions, RasterizedPages,
};
pub use reconstructor::{PdfReconstructor, RenderStats};
pub use validator::validate;
