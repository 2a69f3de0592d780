//! Translation clients and the layout-aware translation driver.

mod http;
mod layout_aware;
mod placeholder;

pub use http::{HttpTranslator, TranslationMetrics};
pub use layout_aware::LayoutAwareTranslator;
pub use placeholder::{PlaceholderEntry, PlaceholderMasker, RestoreAction, restore};

use async_trait::async_trait;

use crate::Result;

/// Model-agnostic translation seam.
///
/// Implementations own their transport, concurrency limiting, rate
/// limiting, and retries; callers see plain string-in/string-out.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Short identifier for logs and cache keys.
    fn name(&self) -> &str;

    /// Translate a single string.
    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String>;

    /// Translate many strings.
    ///
    /// The result has exactly one entry per input, in input order; item
    /// failures surface as per-index errors without failing the batch.
    async fn translate_batch(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Vec<Result<String>>;

    /// Release transport resources. Idempotent.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
