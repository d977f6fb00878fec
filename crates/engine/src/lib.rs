pub mod classify;
pub mod matcher;
pub mod pipeline;
pub mod recon;
pub mod rules;

#[cfg(feature = "llm")]
pub mod llm;

pub use classify::{Classify, RuleClassifier};
pub use matcher::{contains_any, Term};
pub use pipeline::{tag_summary, Tagger};
pub use recon::{find_loan_reversal, ReversalIndex};
pub use rules::{BounceRule, ConfigError, RuleKind, RuleSet};

#[cfg(feature = "llm")]
pub use llm::LlmClassifier;
