//! User-choice matching scenarios against a real (in-memory) store.

use lingopdf::choices::{ChoiceScope, ChoiceType, NewChoice, TranslationContext, UserChoiceStore};
use lingopdf::core::config::ChoiceConfig;

fn new_store() -> UserChoiceStore {
    UserChoiceStore::open_in_memory(ChoiceConfig::default()).unwrap()
}

fn dasein_context() -> TranslationContext {
    TranslationContext {
        semantic_field: "existential_philosophy".into(),
        philosophical_domain: "ontology".into(),
        author: "Heidegger".into(),
        source_language: "de".into(),
        target_language: "en".into(),
        ..Default::default()
    }
}

/// Drive the stored choice's success rate to roughly 0.9 through usage.
fn establish_track_record(store: &UserChoiceStore, choice_id: &str) {
    for _ in 0..40 {
        store.record_usage(choice_id, true).unwrap();
    }
}

#[test]
fn identical_context_returns_the_choice() {
    let store = new_store();
    let made = store
        .make_choice(
            NewChoice::new("Dasein", ChoiceType::Preserve, ChoiceScope::Contextual)
                .with_context(dasein_context()),
        )
        .unwrap();
    establish_track_record(&store, &made.choice_id);

    let found = store
        .get_choice("Dasein", &dasein_context(), None)
        .unwrap()
        .expect("exact context must match");
    assert_eq!(found.choice_id, made.choice_id);
    assert!(found.success_rate > 0.9);
}

#[test]
fn different_author_same_field_still_matches() {
    let store = new_store();
    let made = store
        .make_choice(
            NewChoice::new("Dasein", ChoiceType::Preserve, ChoiceScope::Contextual)
                .with_context(dasein_context()),
        )
        .unwrap();
    establish_track_record(&store, &made.choice_id);

    // Author differs (0.15 weight): similarity 0.85, above threshold.
    let mut context = dasein_context();
    context.author = "Sartre".into();
    let found = store
        .get_choice("Dasein", &context, None)
        .unwrap()
        .expect("similar context must fall back to the contextual choice");
    assert_eq!(found.choice_id, made.choice_id);
}

#[test]
fn unrelated_semantic_field_returns_nothing() {
    let store = new_store();
    let made = store
        .make_choice(
            NewChoice::new("Dasein", ChoiceType::Preserve, ChoiceScope::Contextual)
                .with_context(dasein_context()),
        )
        .unwrap();
    establish_track_record(&store, &made.choice_id);

    let mut context = dasein_context();
    context.semantic_field = "logic".into();
    assert!(store.get_choice("Dasein", &context, None).unwrap().is_none());
}

#[test]
fn export_import_preserves_choices_by_id() {
    let store = new_store();
    let mut ids = Vec::new();
    for (term, choice_type) in [
        ("Dasein", ChoiceType::Preserve),
        ("Aufhebung", ChoiceType::Translate),
        ("Zeitlichkeit", ChoiceType::Skip),
    ] {
        let made = store
            .make_choice(
                NewChoice::new(term, choice_type, ChoiceScope::Global).with_context(dasein_context()),
            )
            .unwrap();
        ids.push((term, made.choice_id));
    }

    let exported = store.export(None).unwrap();
    let restored = new_store();
    assert_eq!(restored.import(&exported, None).unwrap(), 3);

    for (term, id) in ids {
        let found = restored.choices_for_term(term).unwrap();
        assert!(
            found.iter().any(|c| c.choice_id == id),
            "{term} lost its identity across the round trip"
        );
    }
}

#[test]
fn success_rate_invariant_under_any_usage_sequence() {
    let store = new_store();
    let choice = store
        .make_choice(
            NewChoice::new("Dasein", ChoiceType::Preserve, ChoiceScope::Global)
                .with_context(dasein_context()),
        )
        .unwrap();

    // Alternate and clustered outcomes; the EMA must stay within [0, 1].
    let outcomes = [true, false, true, true, false, false, false, true]
        .into_iter()
        .cycle()
        .take(100);
    for outcome in outcomes {
        store.record_usage(&choice.choice_id, outcome).unwrap();
        let current = store.choices_for_term("Dasein").unwrap().remove(0);
        assert!((0.0..=1.0).contains(&current.success_rate));
    }
}
