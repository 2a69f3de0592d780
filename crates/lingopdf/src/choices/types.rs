//! User-choice and session record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::TranslationContext;
use crate::{LingoError, Result};

/// What the user decided to do with a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChoiceType {
    /// Use the service translation of the term.
    Translate,
    /// Keep the term verbatim in the output.
    Preserve,
    /// Use a user-supplied translation.
    Custom,
    /// Leave the term to ordinary translation, no special handling.
    Skip,
}

impl ChoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Translate => "TRANSLATE",
            Self::Preserve => "PRESERVE",
            Self::Custom => "CUSTOM",
            Self::Skip => "SKIP",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "TRANSLATE" => Ok(Self::Translate),
            "PRESERVE" => Ok(Self::Preserve),
            "CUSTOM" => Ok(Self::Custom),
            "SKIP" => Ok(Self::Skip),
            other => Err(LingoError::invalid_input(format!("unknown choice type '{other}'"))),
        }
    }
}

/// Where a choice applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChoiceScope {
    Global,
    Contextual,
    Document,
    Session,
}

impl ChoiceScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "GLOBAL",
            Self::Contextual => "CONTEXTUAL",
            Self::Document => "DOCUMENT",
            Self::Session => "SESSION",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "GLOBAL" => Ok(Self::Global),
            "CONTEXTUAL" => Ok(Self::Contextual),
            "DOCUMENT" => Ok(Self::Document),
            "SESSION" => Ok(Self::Session),
            other => Err(LingoError::invalid_input(format!("unknown choice scope '{other}'"))),
        }
    }

    /// Precedence for exact-match lookups: SESSION wins over DOCUMENT,
    /// DOCUMENT over CONTEXTUAL, CONTEXTUAL over GLOBAL.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Session => 3,
            Self::Document => 2,
            Self::Contextual => 1,
            Self::Global => 0,
        }
    }
}

/// A persisted user decision for one term in one context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserChoice {
    pub choice_id: String,
    pub term: String,
    pub choice_type: ChoiceType,
    /// Replacement text; required (non-empty) for CUSTOM choices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_result: Option<String>,
    pub context: TranslationContext,
    pub scope: ChoiceScope,
    pub confidence_level: f64,
    pub usage_count: u64,
    /// Exponential moving average of recorded outcomes, in 0–1.
    pub success_rate: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

impl UserChoice {
    /// Enforce the record invariants; import and make_choice both call
    /// this before anything touches the store.
    pub fn validate(&self) -> Result<()> {
        if self.choice_id.is_empty() {
            return Err(LingoError::invalid_input("choice_id must not be empty"));
        }
        if self.term.trim().is_empty() {
            return Err(LingoError::invalid_input("term must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.success_rate) {
            return Err(LingoError::invalid_input(format!(
                "success_rate {} is outside [0, 1]",
                self.success_rate
            )));
        }
        if self.choice_type == ChoiceType::Custom
            && self
                .translation_result
                .as_deref()
                .is_none_or(|t| t.trim().is_empty())
        {
            return Err(LingoError::invalid_input(
                "CUSTOM choices require a non-empty translation_result",
            ));
        }
        Ok(())
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Completed,
    Suspended,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Suspended => "SUSPENDED",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "COMPLETED" => Ok(Self::Completed),
            "SUSPENDED" => Ok(Self::Suspended),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(LingoError::invalid_input(format!("unknown session status '{other}'"))),
        }
    }

    /// Expired and completed sessions reject new writes; reads stay open.
    pub fn accepts_writes(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Per-type counters of choices made in a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceCounts {
    pub translate: u64,
    pub preserve: u64,
    pub custom: u64,
    pub skip: u64,
}

impl ChoiceCounts {
    pub fn total(&self) -> u64 {
        self.translate + self.preserve + self.custom + self.skip
    }

    pub fn bump(&mut self, choice_type: ChoiceType) {
        match choice_type {
            ChoiceType::Translate => self.translate += 1,
            ChoiceType::Preserve => self.preserve += 1,
            ChoiceType::Custom => self.custom += 1,
            ChoiceType::Skip => self.skip += 1,
        }
    }
}

/// A bounded working session of user decisions.
///
/// Sessions reference choices by `session_id`; deleting a session leaves
/// GLOBAL and CONTEXTUAL choices untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceSession {
    pub session_id: String,
    pub name: String,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub source_language: String,
    pub target_language: String,
    pub counts: ChoiceCounts,
    pub consistency_score: f64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A detected disagreement between two similar-context choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceConflict {
    pub conflict_id: String,
    pub term: String,
    pub first_choice_id: String,
    pub second_choice_id: String,
    pub similarity: f64,
    pub detected_at: DateTime<Utc>,
}

/// Deterministic conflict-resolution policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionPolicy {
    /// Keep the most recently updated choice.
    LatestWins,
    /// Keep the choice with the higher confidence level.
    HighestConfidence,
    /// Both choices stay; contexts disambiguate at lookup time.
    ContextSpecific,
    /// Defer to the user; the conflict stays open and is surfaced.
    UserPrompt,
}
