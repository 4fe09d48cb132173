use super::normalize::RuleNormalizer;
use crate::config::PluginSettings;
use crate::error::PluginError;
use crate::types::RawRule;
use tracing::debug;

/// Finds the single top-level rule that handles component files.
pub struct RuleLocator<'a> {
    settings: &'a PluginSettings,
}

impl<'a> RuleLocator<'a> {
    pub fn new(settings: &'a PluginSettings) -> Self {
        Self { settings }
    }

    /// Index of the component rule in `rules`.
    ///
    /// Each candidate is normalized on its own with `include` removed, so a
    /// rule scoped to a source directory still matches the bare probe path.
    /// Rules tagged with `enforce` never qualify.
    pub fn locate<N>(&self, rules: &[RawRule], normalizer: &N) -> Result<usize, PluginError>
    where
        N: RuleNormalizer + ?Sized,
    {
        let mut matches = Vec::new();
        for (index, rule) in rules.iter().enumerate() {
            if rule.enforce.is_some() {
                continue;
            }
            if self.matches_probe(rule, normalizer)? {
                debug!(index, probe = %self.settings.probe_resource, "rule matches component files");
                matches.push(index);
            }
        }

        let index = match matches.as_slice() {
            [] => {
                return Err(PluginError::NoMatchingRule {
                    plugin: self.settings.plugin_name.clone(),
                    extension: self.settings.extension.clone(),
                })
            }
            [index] => *index,
            _ => {
                return Err(PluginError::AmbiguousRule {
                    plugin: self.settings.plugin_name.clone(),
                    extension: self.settings.extension.clone(),
                    indices: matches,
                })
            }
        };

        if rules[index].one_of.is_some() {
            return Err(PluginError::UnsupportedBranching {
                plugin: self.settings.plugin_name.clone(),
                extension: self.settings.extension.clone(),
                index,
            });
        }

        Ok(index)
    }

    fn matches_probe<N>(&self, rule: &RawRule, normalizer: &N) -> Result<bool, PluginError>
    where
        N: RuleNormalizer + ?Sized,
    {
        let candidate = RawRule {
            include: None,
            ..rule.clone()
        };
        let normalized = normalizer.normalize(std::slice::from_ref(&candidate))?;
        let Some(normalized) = normalized.rules.first() else {
            return Err(PluginError::Misaligned {
                raw: 1,
                normalized: 0,
            });
        };

        Ok(normalized
            .resource
            .as_ref()
            .is_some_and(|resource| resource(&self.settings.probe_resource)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::normalize::RuleSetNormalizer;
    use serde_json::{json, Value};

    fn locate(value: Value) -> Result<usize, PluginError> {
        let rules: Vec<RawRule> = serde_json::from_value(value).unwrap();
        let settings = PluginSettings::default();
        RuleLocator::new(&settings).locate(&rules, &RuleSetNormalizer::new())
    }

    #[test]
    fn test_locates_single_component_rule() {
        let index = locate(json!([
            { "test": { "regex": "\\.css$" }, "use": ["css-loader"] },
            { "test": { "regex": "\\.vue$" }, "loader": "vue-loader" }
        ]))
        .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn test_include_is_ignored_while_locating() {
        let index = locate(json!([
            { "test": { "regex": "\\.vue$" }, "include": "/project/src", "loader": "vue-loader" }
        ]))
        .unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn test_enforced_rules_are_skipped() {
        let result = locate(json!([
            { "test": { "regex": "\\.vue$" }, "enforce": "pre", "loader": "eslint-loader" }
        ]));
        assert!(matches!(result, Err(PluginError::NoMatchingRule { .. })));
    }

    #[test]
    fn test_rule_without_resource_test_does_not_match() {
        let result = locate(json!([{ "loader": "vue-loader" }]));
        assert!(matches!(result, Err(PluginError::NoMatchingRule { .. })));
    }

    #[test]
    fn test_multiple_matches_are_ambiguous() {
        let result = locate(json!([
            { "test": { "regex": "\\.vue$" }, "loader": "vue-loader" },
            { "test": { "regex": "\\.(vue|js)$" }, "use": ["babel-loader"] }
        ]));
        match result {
            Err(PluginError::AmbiguousRule { indices, .. }) => assert_eq!(indices, vec![0, 1]),
            other => panic!("expected ambiguous rule error, got {other:?}"),
        }
    }

    #[test]
    fn test_one_of_component_rule_is_rejected() {
        let result = locate(json!([{
            "test": { "regex": "\\.vue$" },
            "oneOf": [{ "use": ["vue-loader"] }]
        }]));
        assert!(matches!(
            result,
            Err(PluginError::UnsupportedBranching { index: 0, .. })
        ));
    }

    #[test]
    fn test_error_message_names_plugin_and_extension() {
        let err = locate(json!([])).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("[VueLoaderPlugin Error]"));
        assert!(message.contains(".vue files"));
    }
}
