// sfcroute core library
//
// Rewrites a bundler's rule list so single-file components are split into
// per-language virtual resources, each handled by the user's existing rules.

pub mod condition;
pub mod config;
pub mod error;
pub mod query;
pub mod report;
pub mod rules;
pub mod types;

// Re-export main types and functions for easy use
pub use condition::{ComponentQuery, Condition, ConditionObject, Predicate, ResourceMatch};
pub use config::{PluginConfig, PluginSettings};
pub use error::{ConfigError, NormalizeError, PluginError};
pub use query::SyntheticResourceQuery;
pub use report::TransformReport;
pub use rules::{
    ComponentRulePlugin, NormalizedRule, NormalizedRuleSet, RuleNormalizer, RuleSetNormalizer,
    TransformOutcome, TransformSummary,
};
pub use types::*;
