use crate::config::PluginSettings;
use crate::types::RawRule;

/// Puts the final rule list together:
/// `[pitcher] ++ clones ++ original rules`, with the component rule's slot
/// taking its ident-injected rewrite.
pub struct Assembler<'a> {
    settings: &'a PluginSettings,
}

impl<'a> Assembler<'a> {
    pub fn new(settings: &'a PluginSettings) -> Self {
        Self { settings }
    }

    /// `{ loader: <pitcher> }`, applied to every request.
    pub fn pitcher_rule(&self) -> RawRule {
        RawRule::loader_only(self.settings.pitcher_loader.clone())
    }

    pub fn assemble(
        &self,
        original: &[RawRule],
        component_index: usize,
        component_rule: RawRule,
        clones: Vec<RawRule>,
    ) -> Vec<RawRule> {
        let mut rules = Vec::with_capacity(1 + clones.len() + original.len());
        rules.push(self.pitcher_rule());
        rules.extend(clones);

        let offset = rules.len();
        rules.extend(original.iter().cloned());
        if let Some(slot) = rules.get_mut(offset + component_index) {
            *slot = component_rule;
        }
        rules
    }
}
