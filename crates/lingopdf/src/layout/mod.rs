//! Layout preservation: fit analysis, strategy selection, application.

mod engine;
mod wrap;

pub use engine::{AppliedLayout, FitAnalysis, LayoutEngine, LayoutStrategy, StrategyKind};
pub use wrap::{WrappedText, wrap_greedy};
