//! The declarative rules engine (C4): condition DSL, flat and phased
//! evaluators, file-based rule loading.

pub mod condition;
pub mod context;
pub mod evaluation;
pub mod flat;
pub mod loader;
pub mod phased;
pub mod rule;

pub use condition::{Condition, Operator};
pub use context::RuleContext;
pub use evaluation::{Decision, RuleEvaluation};
pub use flat::evaluate_flat;
pub use loader::{load_directory, load_file, LoaderError};
pub use phased::evaluate_phased;
pub use rule::{Phase, Rule};
