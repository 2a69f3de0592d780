//! Remote OCR integration: wire model, HTTP client, and normalization
//! into text blocks.

mod client;
mod parser;
pub mod wire;

pub use client::{OcrClient, OcrMetrics};
pub use parser::parse_layout;
pub use wire::OcrLayout;

use async_trait::async_trait;

use crate::Result;

/// Seam over the OCR backend so the pipeline can run against mocks.
#[async_trait]
pub trait OcrService: Send + Sync {
    /// Submit page images (in page order) and return the layout response.
    async fn process(&self, images: &[Vec<u8>]) -> Result<OcrLayout>;
}

#[async_trait]
impl OcrService for OcrClient {
    async fn process(&self, images: &[Vec<u8>]) -> Result<OcrLayout> {
        OcrClient::process(self, images).await
    }
}
