//! Pipeline-wide configuration.

pub mod config;

pub use config::{
    ChoiceConfig, JobConfig, LayoutConfig, OcrConfig, PdfConfig, PipelineConfig, TranslationConfig,
};
