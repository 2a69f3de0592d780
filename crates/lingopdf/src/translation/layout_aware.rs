//! Layout-aware translation: the bridge between text blocks, the
//! translation client, the user-choice store, and the layout engine.
//!
//! Per block: normalize whitespace, mask protected terms, translate in
//! batches, restore the masks, then fit the result back into the block's
//! box via the layout engine. Per-item translation failures fall back to
//! the source text with a reduced confidence instead of failing the page.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::choices::{ChoiceLookup, ChoiceType, NeologismTagger};
use crate::layout::LayoutEngine;
use crate::types::{TextBlock, TranslatedElement};
use crate::utils::normalize_whitespace;
use crate::Result;

use super::placeholder::{PlaceholderEntry, PlaceholderMasker, RestoreAction, restore};
use super::Translator;

/// Confidence multiplier for elements whose translation failed and fell
/// back to the source text.
const FALLBACK_CONFIDENCE_FACTOR: f64 = 0.5;

/// Drives translation of parsed text blocks under layout constraints.
pub struct LayoutAwareTranslator {
    translator: Arc<dyn Translator>,
    engine: LayoutEngine,
    tagger: Option<Arc<dyn NeologismTagger>>,
    batch_size: usize,
}

impl LayoutAwareTranslator {
    pub fn new(translator: Arc<dyn Translator>, engine: LayoutEngine) -> Self {
        Self {
            translator,
            engine,
            tagger: None,
            batch_size: 100,
        }
    }

    /// Plug in a neologism tagger; without one (or without a choice
    /// store) blocks translate verbatim.
    pub fn with_tagger(mut self, tagger: Arc<dyn NeologismTagger>) -> Self {
        self.tagger = Some(tagger);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Translate one page's blocks into positioned elements.
    pub async fn translate_blocks(
        &self,
        blocks: &[TextBlock],
        source_lang: &str,
        target_lang: &str,
        choices: Option<&dyn ChoiceLookup>,
        session_id: Option<&str>,
    ) -> Result<Vec<TranslatedElement>> {
        let mut masker = PlaceholderMasker::new();
        let mut prepared: Vec<(String, Vec<PlaceholderEntry>)> = Vec::with_capacity(blocks.len());

        for block in blocks {
            let normalized = normalize_whitespace(&block.text).into_owned();
            let (masked, entries) =
                self.mask_protected_terms(&normalized, source_lang, target_lang, choices, session_id, &mut masker)?;
            prepared.push((masked, entries));
        }

        // Batch across the page; the client bounds concurrency itself.
        let texts: Vec<String> = prepared.iter().map(|(masked, _)| masked.clone()).collect();
        let mut outcomes: Vec<Result<String>> = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            outcomes.extend(
                self.translator
                    .translate_batch(chunk, source_lang, target_lang)
                    .await,
            );
        }

        let mut elements = Vec::with_capacity(blocks.len());
        for ((block, (masked, entries)), outcome) in
            blocks.iter().zip(prepared.iter()).zip(outcomes)
        {
            let (raw_translation, fell_back) = match outcome {
                Ok(translated) => (translated, false),
                Err(err) => {
                    warn!(
                        code = err.code(),
                        "translation failed for a block, keeping source text"
                    );
                    (masked.clone(), true)
                }
            };
            let translated = restore(&raw_translation, entries);

            let source_len = block.char_count();
            let target_len = translated.chars().count();
            let fit = self
                .engine
                .analyze_fit(source_len, target_len, &block.bbox, &block.font);
            let strategy = self.engine.decide_strategy(&fit);
            let applied = self.engine.apply(&translated, &block.bbox, &block.font, &strategy);

            let mut confidence = self.engine.quality_score(&fit, &strategy);
            if fell_back {
                confidence *= FALLBACK_CONFIDENCE_FACTOR;
            }

            elements.push(TranslatedElement {
                original_text: block.text.clone(),
                translated_text: translated,
                adjusted_text: applied.text,
                bbox: applied.bbox,
                font_info: applied.font,
                layout_strategy_name: strategy.kind.as_str().to_string(),
                confidence,
            });
        }

        debug!(
            blocks = blocks.len(),
            elements = elements.len(),
            "translated page blocks"
        );
        Ok(elements)
    }

    /// Mask terms with an applicable user choice. SKIP choices (and terms
    /// without a choice) stay unmasked and translate normally.
    fn mask_protected_terms(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        choices: Option<&dyn ChoiceLookup>,
        session_id: Option<&str>,
        masker: &mut PlaceholderMasker,
    ) -> Result<(String, Vec<PlaceholderEntry>)> {
        let (Some(tagger), Some(choices)) = (self.tagger.as_deref(), choices) else {
            return Ok((text.to_string(), vec![]));
        };

        let mut spans: Vec<(usize, usize, RestoreAction)> = Vec::new();
        for tagged in tagger.tag(text, source_lang) {
            let mut context = tagged.context.clone();
            context.source_language = source_lang.to_string();
            context.target_language = target_lang.to_string();

            let Some(choice) = choices.lookup(&tagged.term, &context, session_id)? else {
                continue;
            };

            let action = match choice.choice_type {
                ChoiceType::Preserve => RestoreAction::Preserve,
                ChoiceType::Translate | ChoiceType::Custom => match choice.translation_result {
                    Some(result) if !result.is_empty() => RestoreAction::Replace(result),
                    _ => RestoreAction::Preserve,
                },
                ChoiceType::Skip => continue,
            };
            spans.push((tagged.span.0, tagged.span.1, action));
        }

        spans.sort_by_key(|(start, _, _)| *start);
        Ok(masker.mask(text, &spans))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choices::{
        ChoiceScope, HeuristicTagger, TranslationContext, UserChoice,
    };
    use crate::core::config::LayoutConfig;
    use crate::types::{BoundingBox, FontInfo};
    use crate::{LingoError, Result};
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;

    /// Uppercases everything outside placeholder markers; placeholder
    /// tokens pass through like a well-behaved translation service.
    struct UppercaseTranslator {
        calls: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl UppercaseTranslator {
        fn new() -> Self {
            Self {
                calls: Mutex::new(vec![]),
                fail_on: None,
            }
        }

        fn failing_on(text: &str) -> Self {
            Self {
                calls: Mutex::new(vec![]),
                fail_on: Some(text.to_string()),
            }
        }
    }

    #[async_trait]
    impl Translator for UppercaseTranslator {
        fn name(&self) -> &str {
            "uppercase"
        }

        async fn translate(&self, text: &str, _: &str, _: &str) -> Result<String> {
            self.calls.lock().push(text.to_string());
            if self.fail_on.as_deref() == Some(text) {
                return Err(LingoError::ServiceUnavailable {
                    message: "boom".into(),
                });
            }
            // Leave ⟦NEO:n⟧ markers untouched, uppercase the rest.
            let mut out = String::new();
            let mut rest = text;
            while let Some(start) = rest.find('⟦') {
                out.push_str(&rest[..start].to_uppercase());
                let Some(end_rel) = rest[start..].find('⟧') else {
                    break;
                };
                let end = start + end_rel + '⟧'.len_utf8();
                out.push_str(&rest[start..end]);
                rest = &rest[end..];
            }
            out.push_str(&rest.to_uppercase());
            Ok(out)
        }

        async fn translate_batch(&self, texts: &[String], src: &str, tgt: &str) -> Vec<Result<String>> {
            let mut results = Vec::new();
            for text in texts {
                results.push(self.translate(text, src, tgt).await);
            }
            results
        }
    }

    /// Fixed-table lookup standing in for the sqlite store.
    struct TableLookup {
        entries: Vec<UserChoice>,
    }

    impl ChoiceLookup for TableLookup {
        fn lookup(
            &self,
            term: &str,
            _context: &TranslationContext,
            _session_id: Option<&str>,
        ) -> Result<Option<UserChoice>> {
            Ok(self.entries.iter().find(|c| c.term == term).cloned())
        }
    }

    fn choice(term: &str, choice_type: ChoiceType, result: Option<&str>) -> UserChoice {
        let now = Utc::now();
        UserChoice {
            choice_id: format!("id-{term}"),
            term: term.into(),
            choice_type,
            translation_result: result.map(String::from),
            context: TranslationContext::default(),
            scope: ChoiceScope::Global,
            confidence_level: 0.9,
            usage_count: 0,
            success_rate: 0.9,
            created_at: now,
            updated_at: now,
            last_used_at: None,
            session_id: None,
            document_id: None,
        }
    }

    fn block(text: &str) -> TextBlock {
        TextBlock::new(
            text,
            BoundingBox::new(0.0, 0.0, 400.0, 20.0),
            FontInfo::new("Helvetica", 12.0),
        )
    }

    fn translator_under_test(translator: Arc<dyn Translator>) -> LayoutAwareTranslator {
        LayoutAwareTranslator::new(translator, LayoutEngine::new(LayoutConfig::default()))
            .with_tagger(Arc::new(HeuristicTagger))
    }

    #[tokio::test]
    async fn test_translates_blocks_without_choices() {
        let translator = translator_under_test(Arc::new(UppercaseTranslator::new()));
        let blocks = vec![block("hello world"), block("second block")];
        let elements = translator
            .translate_blocks(&blocks, "en", "de", None, None)
            .await
            .unwrap();

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].translated_text, "HELLO WORLD");
        assert_eq!(elements[0].layout_strategy_name, "none");
        assert!(elements[0].confidence > 0.9);
    }

    #[tokio::test]
    async fn test_preserved_term_survives_translation() {
        let translator = translator_under_test(Arc::new(UppercaseTranslator::new()));
        let lookup = TableLookup {
            entries: vec![choice("Dasein", ChoiceType::Preserve, None)],
        };
        let blocks = vec![block("the concept of Dasein matters")];
        let elements = translator
            .translate_blocks(&blocks, "de", "en", Some(&lookup), None)
            .await
            .unwrap();

        // Everything translated except the preserved term.
        assert_eq!(elements[0].translated_text, "THE CONCEPT OF Dasein MATTERS");
    }

    #[tokio::test]
    async fn test_custom_term_replaced() {
        let translator = translator_under_test(Arc::new(UppercaseTranslator::new()));
        let lookup = TableLookup {
            entries: vec![choice("Aufhebung", ChoiceType::Custom, Some("sublation"))],
        };
        let blocks = vec![block("the concept of Aufhebung here")];
        let elements = translator
            .translate_blocks(&blocks, "de", "en", Some(&lookup), None)
            .await
            .unwrap();

        assert_eq!(elements[0].translated_text, "THE CONCEPT OF sublation HERE");
    }

    #[tokio::test]
    async fn test_skip_choice_translates_normally() {
        let translator = translator_under_test(Arc::new(UppercaseTranslator::new()));
        let lookup = TableLookup {
            entries: vec![choice("Dasein", ChoiceType::Skip, None)],
        };
        let blocks = vec![block("the concept of Dasein matters")];
        let elements = translator
            .translate_blocks(&blocks, "de", "en", Some(&lookup), None)
            .await
            .unwrap();

        assert_eq!(elements[0].translated_text, "THE CONCEPT OF DASEIN MATTERS");
    }

    #[tokio::test]
    async fn test_failed_item_falls_back_to_source() {
        let translator = translator_under_test(Arc::new(UppercaseTranslator::failing_on("bad block")));
        let blocks = vec![block("good block"), block("bad block")];
        let elements = translator
            .translate_blocks(&blocks, "en", "de", None, None)
            .await
            .unwrap();

        assert_eq!(elements[0].translated_text, "GOOD BLOCK");
        assert_eq!(elements[1].translated_text, "bad block");
        assert!(elements[1].confidence < elements[0].confidence);
    }

    #[tokio::test]
    async fn test_whitespace_normalized_before_submission() {
        let uppercase = Arc::new(UppercaseTranslator::new());
        let translator = translator_under_test(uppercase.clone());
        let blocks = vec![block("hello    world\n\n\nagain")];
        translator
            .translate_blocks(&blocks, "en", "de", None, None)
            .await
            .unwrap();

        let calls = uppercase.calls.lock();
        assert_eq!(calls[0], "hello world\nagain");
    }

    #[tokio::test]
    async fn test_output_order_matches_input_order() {
        let translator = translator_under_test(Arc::new(UppercaseTranslator::new()));
        let blocks: Vec<TextBlock> = (0..10).map(|i| block(&format!("block number {i}"))).collect();
        let elements = translator
            .translate_blocks(&blocks, "en", "de", None, None)
            .await
            .unwrap();

        for (i, element) in elements.iter().enumerate() {
            assert_eq!(element.original_text, format!("block number {i}"));
        }
    }
}
