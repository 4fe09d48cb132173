use super::normalize::NormalizedRule;
use crate::condition::{ComponentQuery, Condition};
use crate::config::PluginSettings;
use crate::error::PluginError;
use crate::types::*;
use serde_json::Value;
use tracing::debug;

/// Builds the component-block twin of a user rule.
///
/// A clone matches `<name>.<ext>?...&lang=<lang>` requests whenever the
/// original rule would match `<name>.<lang>` and the original query. Its
/// chain is the original's normalized chain, with idents moved into the
/// options objects so both rules resolve to identical loader requests.
pub struct RuleCloner<'a> {
    settings: &'a PluginSettings,
}

impl<'a> RuleCloner<'a> {
    pub fn new(settings: &'a PluginSettings) -> Self {
        Self { settings }
    }

    pub fn clone_rule(&self, raw: &RawRule, normalized: &NormalizedRule) -> Result<RawRule, PluginError> {
        let component = ComponentQuery::new(
            self.settings.extension.clone(),
            self.settings.lang_key.clone(),
            normalized.resource.clone(),
            normalized.resource_query.clone(),
        );

        let chain = if normalized.use_entries.is_empty() {
            None
        } else {
            Some(LoaderShorthand::UseArray(
                normalized
                    .use_entries
                    .iter()
                    .map(|entry| UseItem::Entry(self.reuse_ident(entry)))
                    .collect(),
            ))
        };

        let one_of = match (&raw.one_of, &normalized.one_of) {
            (Some(raw_branches), Some(normalized_branches)) => {
                if raw_branches.len() != normalized_branches.len() {
                    return Err(PluginError::Misaligned {
                        raw: raw_branches.len(),
                        normalized: normalized_branches.len(),
                    });
                }
                let branches = raw_branches
                    .iter()
                    .zip(normalized_branches)
                    .map(|(raw, normalized)| self.clone_rule(raw, normalized))
                    .collect::<Result<Vec<_>, _>>()?;
                Some(branches)
            }
            (None, None) => None,
            (Some(raw_branches), None) => {
                return Err(PluginError::Misaligned {
                    raw: raw_branches.len(),
                    normalized: 0,
                })
            }
            (None, Some(normalized_branches)) => {
                return Err(PluginError::Misaligned {
                    raw: 0,
                    normalized: normalized_branches.len(),
                })
            }
        };

        Ok(RawRule {
            test: Some(Condition::Pattern {
                regex: self.settings.component_resource.clone(),
                flags: String::new(),
            }),
            include: raw.include.clone(),
            exclude: raw.exclude.clone(),
            resource: None,
            resource_query: Some(Condition::Component(component)),
            enforce: raw.enforce,
            chain,
            one_of,
            extra: raw.extra.clone(),
        })
    }

    /// Moves an entry's ident into its options object. Blacklisted loaders
    /// validate their options strictly and are left as they are.
    pub fn reuse_ident(&self, entry: &UseEntry) -> UseEntry {
        let mut entry = entry.clone();
        if self.settings.ident_blacklist.is_match(&entry.loader) {
            return entry;
        }
        let ident = match (&entry.ident, &entry.options) {
            (Some(ident), Some(LoaderOptions::Object(_))) => Some(ident.clone()),
            _ => None,
        };
        let Some(ident) = ident else {
            return entry;
        };
        debug!(loader = %entry.loader, ident = %ident, "reusing options ident in clone");
        if let Some(options) = entry.options.as_mut().and_then(LoaderOptions::as_object_mut) {
            options.insert(IDENT_KEY.to_string(), Value::String(ident));
        }
        entry.ident = None;
        entry
    }
}
