//! Environment-driven pipeline configuration.
//!
//! Every documented key has a default; `PipelineConfig::from_env` applies
//! overrides and fails fast with a `Configuration` error naming the
//! offending key. Supported variables:
//!
//! - `OCR_ENDPOINT`, `OCR_TOKEN`, `OCR_TIMEOUT_SEC` (300),
//!   `OCR_MAX_RETRIES` (3), `OCR_CONCURRENCY` (4)
//! - `TRANSLATION_ENDPOINT`, `TRANSLATION_API_KEY`,
//!   `TRANSLATION_CONCURRENCY` (8), `TRANSLATION_RATE_LIMIT_RPS`
//! - `PDF_DPI` (300), `MAX_FILE_SIZE_MB` (50)
//! - `JOB_RETENTION_HOURS` (24), `SESSION_EXPIRY_HOURS` (24),
//!   `USER_CHOICE_DB_PATH`
//! - `LAYOUT_FONT_SCALE_MIN` (0.6), `LAYOUT_FONT_SCALE_MAX` (1.2),
//!   `LAYOUT_MAX_BBOX_EXPANSION` (0.30), `AVERAGE_CHAR_WIDTH_EM` (0.5),
//!   `LINE_HEIGHT_FACTOR` (1.2)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::{LingoError, Result};

fn env_override<T: FromStr>(key: &str, target: &mut T, describe: &str) -> Result<()> {
    if let Ok(raw) = std::env::var(key) {
        *target = raw.parse().map_err(|_| LingoError::Configuration {
            key: key.to_string(),
            message: format!("invalid value '{raw}', expected {describe}"),
        })?;
    }
    Ok(())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Remote OCR service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    pub endpoint: String,
    /// Bearer token; requests without one are rejected client-side.
    #[serde(skip_serializing, default)]
    pub token: Option<String>,
    pub timeout_sec: u64,
    pub max_retries: u32,
    /// Semaphore width for in-flight OCR calls.
    pub concurrency: usize,
    /// Hard per-image payload limit in bytes.
    pub max_image_bytes: usize,
    /// Hard per-request image count limit.
    pub max_images_per_request: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://ocr.invalid/v1/layout".to_string(),
            token: None,
            timeout_sec: 300,
            max_retries: 3,
            concurrency: 4,
            max_image_bytes: 5 * 1024 * 1024,
            max_images_per_request: 32,
        }
    }
}

impl OcrConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }
}

/// Remote translation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    pub endpoint: String,
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    /// Semaphore width for in-flight translation calls.
    pub concurrency: usize,
    /// Token-bucket refill rate; `None` disables rate limiting.
    pub rate_limit_rps: Option<f64>,
    pub timeout_sec: u64,
    pub max_retries: u32,
    /// Elements per translate_batch call.
    pub batch_size: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://translate.invalid/v1/translate".to_string(),
            api_key: None,
            concurrency: 8,
            rate_limit_rps: None,
            timeout_sec: 60,
            max_retries: 3,
            batch_size: 100,
        }
    }
}

impl TranslationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }
}

/// Layout preservation constants. These are part of the engine's contract;
/// overriding them changes strategy decisions document-wide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub font_scale_min: f64,
    pub font_scale_max: f64,
    pub max_bbox_expansion: f64,
    pub average_char_width_em: f64,
    pub line_height_factor: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            font_scale_min: 0.6,
            font_scale_max: 1.2,
            max_bbox_expansion: 0.30,
            average_char_width_em: 0.5,
            line_height_factor: 1.2,
        }
    }
}

/// Rasterization and input-validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfConfig {
    /// Render resolution, 72–600.
    pub dpi: u32,
    pub max_file_size_mb: u64,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_file_size_mb: 50,
        }
    }
}

/// Job-table housekeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Hours a terminal job stays visible before the sweeper purges it.
    pub retention_hours: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self { retention_hours: 24 }
    }
}

/// User-choice store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceConfig {
    pub db_path: PathBuf,
    pub session_expiry_hours: u64,
    /// Similarity threshold above which two contexts count as similar.
    pub conflict_threshold: f64,
    /// EMA smoothing factor for `record_usage`.
    pub success_rate_alpha: f64,
}

impl Default for ChoiceConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("user_choices.db"),
            session_expiry_hours: 24,
            conflict_threshold: 0.8,
            success_rate_alpha: 0.1,
        }
    }
}

/// Aggregate configuration for the whole pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub ocr: OcrConfig,
    pub translation: TranslationConfig,
    pub layout: LayoutConfig,
    pub pdf: PdfConfig,
    pub jobs: JobConfig,
    pub choices: ChoiceConfig,
}

impl PipelineConfig {
    /// Defaults overlaid with environment variables, then validated.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(endpoint) = env_string("OCR_ENDPOINT") {
            config.ocr.endpoint = endpoint;
        }
        config.ocr.token = env_string("OCR_TOKEN");
        env_override("OCR_TIMEOUT_SEC", &mut config.ocr.timeout_sec, "seconds")?;
        env_override("OCR_MAX_RETRIES", &mut config.ocr.max_retries, "a retry count")?;
        env_override("OCR_CONCURRENCY", &mut config.ocr.concurrency, "a task count")?;

        if let Some(endpoint) = env_string("TRANSLATION_ENDPOINT") {
            config.translation.endpoint = endpoint;
        }
        config.translation.api_key = env_string("TRANSLATION_API_KEY");
        env_override(
            "TRANSLATION_CONCURRENCY",
            &mut config.translation.concurrency,
            "a task count",
        )?;
        if let Ok(raw) = std::env::var("TRANSLATION_RATE_LIMIT_RPS") {
            let rps: f64 = raw.parse().map_err(|_| LingoError::Configuration {
                key: "TRANSLATION_RATE_LIMIT_RPS".to_string(),
                message: format!("invalid value '{raw}', expected requests per second"),
            })?;
            config.translation.rate_limit_rps = Some(rps);
        }

        env_override("PDF_DPI", &mut config.pdf.dpi, "a DPI between 72 and 600")?;
        env_override("MAX_FILE_SIZE_MB", &mut config.pdf.max_file_size_mb, "megabytes")?;

        env_override("JOB_RETENTION_HOURS", &mut config.jobs.retention_hours, "hours")?;
        env_override(
            "SESSION_EXPIRY_HOURS",
            &mut config.choices.session_expiry_hours,
            "hours",
        )?;
        if let Some(path) = env_string("USER_CHOICE_DB_PATH") {
            config.choices.db_path = PathBuf::from(path);
        }

        env_override(
            "LAYOUT_FONT_SCALE_MIN",
            &mut config.layout.font_scale_min,
            "a scale factor",
        )?;
        env_override(
            "LAYOUT_FONT_SCALE_MAX",
            &mut config.layout.font_scale_max,
            "a scale factor",
        )?;
        env_override(
            "LAYOUT_MAX_BBOX_EXPANSION",
            &mut config.layout.max_bbox_expansion,
            "a fraction",
        )?;
        env_override(
            "AVERAGE_CHAR_WIDTH_EM",
            &mut config.layout.average_char_width_em,
            "an em fraction",
        )?;
        env_override(
            "LINE_HEIGHT_FACTOR",
            &mut config.layout.line_height_factor,
            "a line-height multiple",
        )?;

        config.validate()?;
        Ok(config)
    }

    /// Range checks shared by `from_env` and programmatic construction.
    pub fn validate(&self) -> Result<()> {
        if !(72..=600).contains(&self.pdf.dpi) {
            return Err(LingoError::Configuration {
                key: "PDF_DPI".to_string(),
                message: format!("{} is outside the supported range 72-600", self.pdf.dpi),
            });
        }
        if self.layout.font_scale_min <= 0.0 || self.layout.font_scale_min > self.layout.font_scale_max {
            return Err(LingoError::Configuration {
                key: "LAYOUT_FONT_SCALE_MIN".to_string(),
                message: "font scale bounds must satisfy 0 < min <= max".to_string(),
            });
        }
        if self.layout.max_bbox_expansion < 0.0 {
            return Err(LingoError::Configuration {
                key: "LAYOUT_MAX_BBOX_EXPANSION".to_string(),
                message: "expansion fraction must be non-negative".to_string(),
            });
        }
        if self.translation.concurrency == 0 || self.ocr.concurrency == 0 {
            return Err(LingoError::Configuration {
                key: "TRANSLATION_CONCURRENCY".to_string(),
                message: "concurrency limits must be at least 1".to_string(),
            });
        }
        if let Some(rps) = self.translation.rate_limit_rps
            && rps <= 0.0
        {
            return Err(LingoError::Configuration {
                key: "TRANSLATION_RATE_LIMIT_RPS".to_string(),
                message: "rate limit must be positive".to_string(),
            });
        }
        Ok(())
    }
}
