//! Detection and resolution of contradictory choices.
//!
//! Two choices on the same term conflict when their contexts are similar
//! (at or above the configured threshold) but they disagree on the choice
//! type or the replacement text.

use chrono::Utc;
use rusqlite::params;
use tracing::warn;
use uuid::Uuid;

use crate::Result;

use super::store::UserChoiceStore;
use super::types::{ChoiceConflict, ResolutionPolicy, UserChoice};

/// Outcome of applying a resolution policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictResolution {
    /// Choice ids that survive.
    pub kept: Vec<String>,
    /// Choice ids deleted by the policy.
    pub removed: Vec<String>,
    /// The policy deferred to the user; nothing changed.
    pub needs_user: bool,
}

impl UserChoiceStore {
    /// Find all pairwise conflicts among the choices for one term.
    ///
    /// Newly detected pairs are persisted to `choice_conflicts`;
    /// re-running detection is idempotent per pair.
    pub fn detect_conflicts(&self, term: &str) -> Result<Vec<ChoiceConflict>> {
        let choices = self.choices_for_term(term)?;
        let threshold = self.config.conflict_threshold;
        let mut conflicts = Vec::new();

        for (i, a) in choices.iter().enumerate() {
            for b in choices.iter().skip(i + 1) {
                let similarity = a.context.similarity(&b.context);
                if similarity < threshold || !disagree(a, b) {
                    continue;
                }

                let (first, second) = ordered_pair(a, b);
                let conflict = ChoiceConflict {
                    conflict_id: Uuid::new_v4().to_string(),
                    term: term.to_string(),
                    first_choice_id: first.choice_id.clone(),
                    second_choice_id: second.choice_id.clone(),
                    similarity,
                    detected_at: Utc::now(),
                };

                let conn = self.conn.lock();
                conn.execute(
                    "INSERT OR IGNORE INTO choice_conflicts
                     (conflict_id, term, first_choice_id, second_choice_id, similarity,
                      resolved, resolution, detected_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL, ?6)",
                    params![
                        conflict.conflict_id,
                        conflict.term,
                        conflict.first_choice_id,
                        conflict.second_choice_id,
                        conflict.similarity,
                        conflict.detected_at.to_rfc3339(),
                    ],
                )?;
                drop(conn);

                conflicts.push(conflict);
            }
        }

        Ok(conflicts)
    }

    /// Apply a deterministic resolution policy to one conflict.
    pub fn resolve_conflict(
        &self,
        conflict: &ChoiceConflict,
        policy: ResolutionPolicy,
    ) -> Result<ConflictResolution> {
        let choices = self.choices_for_term(&conflict.term)?;
        let first = choices
            .iter()
            .find(|c| c.choice_id == conflict.first_choice_id);
        let second = choices
            .iter()
            .find(|c| c.choice_id == conflict.second_choice_id);

        let (Some(first), Some(second)) = (first, second) else {
            // One side is already gone; the conflict is moot.
            self.mark_resolved(conflict, policy)?;
            return Ok(ConflictResolution {
                kept: choices.iter().map(|c| c.choice_id.clone()).collect(),
                removed: vec![],
                needs_user: false,
            });
        };

        let resolution = match policy {
            ResolutionPolicy::LatestWins => {
                let (keep, remove) = if first.updated_at >= second.updated_at {
                    (first, second)
                } else {
                    (second, first)
                };
                self.delete_choice(&remove.choice_id)?;
                ConflictResolution {
                    kept: vec![keep.choice_id.clone()],
                    removed: vec![remove.choice_id.clone()],
                    needs_user: false,
                }
            }
            ResolutionPolicy::HighestConfidence => {
                let (keep, remove) = if first.confidence_level > second.confidence_level
                    || (first.confidence_level == second.confidence_level
                        && first.updated_at >= second.updated_at)
                {
                    (first, second)
                } else {
                    (second, first)
                };
                self.delete_choice(&remove.choice_id)?;
                ConflictResolution {
                    kept: vec![keep.choice_id.clone()],
                    removed: vec![remove.choice_id.clone()],
                    needs_user: false,
                }
            }
            ResolutionPolicy::ContextSpecific => ConflictResolution {
                kept: vec![first.choice_id.clone(), second.choice_id.clone()],
                removed: vec![],
                needs_user: false,
            },
            ResolutionPolicy::UserPrompt => {
                warn!(
                    term = %conflict.term,
                    "conflict requires user attention and stays open"
                );
                ConflictResolution {
                    kept: vec![first.choice_id.clone(), second.choice_id.clone()],
                    removed: vec![],
                    needs_user: true,
                }
            }
        };

        if !resolution.needs_user {
            self.mark_resolved(conflict, policy)?;
        }
        Ok(resolution)
    }

    fn mark_resolved(&self, conflict: &ChoiceConflict, policy: ResolutionPolicy) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE choice_conflicts SET resolved = 1, resolution = ?2
             WHERE (first_choice_id = ?3 AND second_choice_id = ?4) OR conflict_id = ?1",
            params![
                conflict.conflict_id,
                format!("{policy:?}"),
                conflict.first_choice_id,
                conflict.second_choice_id,
            ],
        )?;
        Ok(())
    }

    fn delete_choice(&self, choice_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM user_choices WHERE choice_id = ?1", params![choice_id])?;
        Ok(())
    }
}

fn disagree(a: &UserChoice, b: &UserChoice) -> bool {
    a.choice_type != b.choice_type || a.translation_result != b.translation_result
}

/// Stable ordering so the persisted pair is unique regardless of
/// detection order.
fn ordered_pair<'a>(a: &'a UserChoice, b: &'a UserChoice) -> (&'a UserChoice, &'a UserChoice) {
    if a.choice_id <= b.choice_id { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choices::context::TranslationContext;
    use crate::choices::store::NewChoice;
    use crate::choices::types::{ChoiceScope, ChoiceType};
    use crate::core::config::ChoiceConfig;

    fn store() -> UserChoiceStore {
        UserChoiceStore::open_in_memory(ChoiceConfig::default()).unwrap()
    }

    fn context(author: &str) -> TranslationContext {
        TranslationContext {
            semantic_field: "existential_philosophy".into(),
            philosophical_domain: "ontology".into(),
            author: author.into(),
            source_language: "de".into(),
            target_language: "en".into(),
            ..Default::default()
        }
    }

    fn seed_disagreeing_pair(store: &UserChoiceStore) -> (UserChoice, UserChoice) {
        // Similar contexts (0.85), different decisions.
        let a = store
            .make_choice(
                NewChoice::new("Dasein", ChoiceType::Preserve, ChoiceScope::Contextual)
                    .with_context(context("Heidegger")),
            )
            .unwrap();
        let b = store
            .make_choice(
                NewChoice::new("Dasein", ChoiceType::Custom, ChoiceScope::Contextual)
                    .with_result("being-there")
                    .with_context(context("Gadamer")),
            )
            .unwrap();
        (a, b)
    }

    #[test]
    fn test_detects_similar_disagreeing_choices() {
        let store = store();
        seed_disagreeing_pair(&store);

        let conflicts = store.detect_conflicts("Dasein").unwrap();
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].similarity >= 0.8);
    }

    #[test]
    fn test_agreeing_choices_do_not_conflict() {
        let store = store();
        store
            .make_choice(
                NewChoice::new("Dasein", ChoiceType::Preserve, ChoiceScope::Contextual)
                    .with_context(context("Heidegger")),
            )
            .unwrap();
        store
            .make_choice(
                NewChoice::new("Dasein", ChoiceType::Preserve, ChoiceScope::Contextual)
                    .with_context(context("Gadamer")),
            )
            .unwrap();

        assert!(store.detect_conflicts("Dasein").unwrap().is_empty());
    }

    #[test]
    fn test_dissimilar_contexts_do_not_conflict() {
        let store = store();
        store
            .make_choice(
                NewChoice::new("Dasein", ChoiceType::Preserve, ChoiceScope::Contextual)
                    .with_context(context("Heidegger")),
            )
            .unwrap();
        let mut unrelated = context("Heidegger");
        unrelated.semantic_field = "logic".into();
        unrelated.philosophical_domain = "formal_systems".into();
        store
            .make_choice(
                NewChoice::new("Dasein", ChoiceType::Custom, ChoiceScope::Contextual)
                    .with_result("existence")
                    .with_context(unrelated),
            )
            .unwrap();

        assert!(store.detect_conflicts("Dasein").unwrap().is_empty());
    }

    #[test]
    fn test_latest_wins_removes_older() {
        let store = store();
        let (a, b) = seed_disagreeing_pair(&store);
        let conflicts = store.detect_conflicts("Dasein").unwrap();

        let resolution = store
            .resolve_conflict(&conflicts[0], ResolutionPolicy::LatestWins)
            .unwrap();
        // b was created after a.
        assert_eq!(resolution.kept, vec![b.choice_id.clone()]);
        assert_eq!(resolution.removed, vec![a.choice_id.clone()]);

        let remaining = store.choices_for_term("Dasein").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].choice_id, b.choice_id);
    }

    #[test]
    fn test_context_specific_keeps_both() {
        let store = store();
        seed_disagreeing_pair(&store);
        let conflicts = store.detect_conflicts("Dasein").unwrap();

        let resolution = store
            .resolve_conflict(&conflicts[0], ResolutionPolicy::ContextSpecific)
            .unwrap();
        assert_eq!(resolution.kept.len(), 2);
        assert!(resolution.removed.is_empty());
        assert_eq!(store.choices_for_term("Dasein").unwrap().len(), 2);
    }

    #[test]
    fn test_user_prompt_defers() {
        let store = store();
        seed_disagreeing_pair(&store);
        let conflicts = store.detect_conflicts("Dasein").unwrap();

        let resolution = store
            .resolve_conflict(&conflicts[0], ResolutionPolicy::UserPrompt)
            .unwrap();
        assert!(resolution.needs_user);
        assert_eq!(store.choices_for_term("Dasein").unwrap().len(), 2);
    }

    #[test]
    fn test_detection_is_idempotent_per_pair() {
        let store = store();
        seed_disagreeing_pair(&store);
        store.detect_conflicts("Dasein").unwrap();
        store.detect_conflicts("Dasein").unwrap();

        let conn = store.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM choice_conflicts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
