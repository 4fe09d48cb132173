use super::assembler::Assembler;
use super::cloner::RuleCloner;
use super::ident::IdentInjector;
use super::locator::RuleLocator;
use super::normalize::RuleNormalizer;
use crate::config::{PluginConfig, PluginSettings};
use crate::error::{ConfigError, PluginError};
use crate::types::RawRule;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// What one transformation pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformSummary {
    pub component_rule_index: usize,
    pub compiler_use_index: usize,
    pub input_rules: usize,
    pub cloned_rules: usize,
    pub output_rules: usize,
}

#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub rules: Vec<RawRule>,
    pub summary: TransformSummary,
}

/// Rewrites a host rule list for component-file decomposition.
///
/// One pass locates the component rule, attaches the shared options ident
/// to its compiler loader, clones every other rule for virtual blocks and
/// prepends the pitcher.
#[derive(Debug, Clone, Default)]
pub struct ComponentRulePlugin {
    settings: PluginSettings,
}

impl ComponentRulePlugin {
    pub fn new(config: &PluginConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            settings: config.compile()?,
        })
    }

    pub fn from_settings(settings: PluginSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PluginSettings {
        &self.settings
    }

    /// Computes the rewritten rule list without touching `rules`.
    pub fn transform<N>(&self, rules: &[RawRule], normalizer: &N) -> Result<TransformOutcome, PluginError>
    where
        N: RuleNormalizer + ?Sized,
    {
        let normalized = normalizer.normalize(rules)?;
        if normalized.rules.len() != rules.len() {
            return Err(PluginError::Misaligned {
                raw: rules.len(),
                normalized: normalized.rules.len(),
            });
        }

        let component_index = RuleLocator::new(&self.settings).locate(rules, normalizer)?;
        debug!(component_index, "located component rule");

        let injected = IdentInjector::new(&self.settings).inject(
            component_index,
            &rules[component_index],
            &normalized.rules[component_index],
        )?;

        let cloner = RuleCloner::new(&self.settings);
        let clones = rules
            .iter()
            .zip(&normalized.rules)
            .enumerate()
            .filter(|(index, _)| *index != component_index)
            .map(|(_, (raw, normalized))| cloner.clone_rule(raw, normalized))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(clones = clones.len(), "cloned rules for virtual blocks");

        let summary = TransformSummary {
            component_rule_index: component_index,
            compiler_use_index: injected.compiler_index,
            input_rules: rules.len(),
            cloned_rules: clones.len(),
            output_rules: rules.len() + clones.len() + 1,
        };

        let rules = Assembler::new(&self.settings).assemble(rules, component_index, injected.rule, clones);
        info!(
            plugin = %self.settings.plugin_name,
            input = summary.input_rules,
            output = rules.len(),
            "rule set rewritten"
        );

        Ok(TransformOutcome { rules, summary })
    }

    /// Replaces `rules` with the rewritten list. On error `rules` is unchanged.
    pub fn apply<N>(&self, rules: &mut Vec<RawRule>, normalizer: &N) -> Result<TransformSummary, PluginError>
    where
        N: RuleNormalizer + ?Sized,
    {
        let outcome = self.transform(rules, normalizer)?;
        *rules = outcome.rules;
        Ok(outcome.summary)
    }
}
