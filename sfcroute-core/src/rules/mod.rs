// Rule rewriting pipeline - delegates to one sub-module per stage:
// - normalize.rs: host normalizer trait and the reference rule-set normalizer
// - locator.rs: finds the component rule
// - ident.rs: attaches the shared options ident to the compiler loader
// - cloner.rs: builds virtual-block twins of user rules
// - assembler.rs: orders the final rule list
// - engine.rs: ComponentRulePlugin, running the stages in order

pub mod assembler;
pub mod cloner;
pub mod engine;
pub mod ident;
pub mod locator;
pub mod normalize;

pub use assembler::Assembler;
pub use cloner::RuleCloner;
pub use engine::*;
pub use ident::{IdentInjector, InjectedRule};
pub use locator::RuleLocator;
pub use normalize::{NormalizedRule, NormalizedRuleSet, RuleEffect, RuleNormalizer, RuleSetNormalizer};
