//! User-choice subsystem: persistent, context-aware translation
//! decisions, sessions, conflicts, and neologism tagging.

mod conflicts;
mod context;
mod neologism;
mod session;
mod store;
mod types;

pub use conflicts::ConflictResolution;
pub use context::TranslationContext;
pub use neologism::{HeuristicTagger, NeologismTagger, TaggedTerm};
pub use store::{ChoiceLookup, NewChoice, UserChoiceStore};
pub use types::{
    ChoiceConflict, ChoiceCounts, ChoiceScope, ChoiceSession, ChoiceType, ResolutionPolicy,
    SessionStatus, UserChoice,
};
