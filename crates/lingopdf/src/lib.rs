//! Layout-preserving PDF translation engine.
//!
//! lingopdf translates PDF documents between natural languages while
//! keeping the original visual layout: text positions, fonts, and page
//! geometry. The pipeline validates a document, rasterizes its pages,
//! sends them to a layout-aware OCR service, translates the recognized
//! blocks under layout constraints, and reconstructs a new PDF at the
//! original coordinates.
//!
//! # Subsystems
//!
//! - [`pdf`]: input validation, pdfium rasterization, standard-14 font
//!   fallback, and output reconstruction.
//! - [`ocr`]: the remote OCR client and response normalization.
//! - [`layout`]: the deterministic layout preservation engine with fit
//!   analysis, strategy selection (unchanged / font scale / wrap /
//!   hybrid), and application.
//! - [`translation`]: the translation client seam, the HTTP backend,
//!   and the layout-aware driver with neologism passthrough.
//! - [`choices`]: the persistent user-choice store with context
//!   similarity, sessions, and conflict resolution.
//! - [`jobs`]: the orchestrator driving the stages and tracking
//!   progress.
//! - [`quality`]: post-hoc comparison of original and reconstructed
//!   documents.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lingopdf::core::config::PipelineConfig;
//! use lingopdf::jobs::{JobOrchestrator, PipelineClients};
//! use lingopdf::ocr::OcrClient;
//! use lingopdf::pdf::PdfiumRasterizer;
//! use lingopdf::translation::HttpTranslator;
//!
//! # async fn example() -> lingopdf::Result<()> {
//! let config = PipelineConfig::from_env()?;
//! let clients = PipelineClients {
//!     rasterizer: Arc::new(PdfiumRasterizer),
//!     ocr: Arc::new(OcrClient::new(config.ocr.clone())?),
//!     translator: Arc::new(HttpTranslator::new(config.translation.clone())?),
//!     tagger: None,
//!     choices: None,
//! };
//! let orchestrator = JobOrchestrator::new(config, clients);
//! let job_id = orchestrator.submit("paper.pdf", "de", "en")?;
//! let job = orchestrator.status(&job_id)?;
//! println!("{}: {}%", job.job_id, job.progress);
//! # Ok(())
//! # }
//! ```

pub mod choices;
pub mod core;
pub mod error;
pub mod jobs;
pub mod layout;
pub mod ocr;
pub mod pdf;
pub mod quality;
pub mod translation;
pub mod types;
pub mod utils;

pub use error::{LingoError, Result};

pub use choices::{TranslationContext, UserChoice, UserChoiceStore};
pub use core::config::PipelineConfig;
pub use jobs::{JobOrchestrator, PipelineClients};
pub use layout::{FitAnalysis, LayoutEngine, LayoutStrategy, StrategyKind};
pub use types::{
    BoundingBox, FontInfo, Job, JobStatus, TextBlock, TranslatedElement, TranslatedLayout,
    TranslatedPage,
};
