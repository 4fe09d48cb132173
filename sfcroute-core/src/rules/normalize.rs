// Rule normalization - the host collaborator this crate reads rules through.
//
// Normalizing compiles a rule's match conditions into predicates and flattens
// whichever chain shorthand it used into one ordered list of `UseEntry`s.
// `RuleSetNormalizer` follows the usual loader-rule semantics; hosts with
// their own normalization implement `RuleNormalizer` instead.

use crate::condition::{QueryPredicate, ResourceMatch, ResourcePredicate};
use crate::error::NormalizeError;
use crate::query::split_loader_request;
use crate::types::*;
use std::collections::BTreeMap;
use std::fmt;

/// Normalizes a raw rule list. The output is index-aligned with the input.
pub trait RuleNormalizer {
    fn normalize(&self, rules: &[RawRule]) -> Result<NormalizedRuleSet, NormalizeError>;
}

#[derive(Clone, Default)]
pub struct NormalizedRule {
    pub resource: Option<ResourcePredicate>,
    pub resource_query: Option<QueryPredicate>,
    pub enforce: Option<Enforce>,
    pub use_entries: Vec<UseEntry>,
    pub one_of: Option<Vec<NormalizedRule>>,
}

impl NormalizedRule {
    /// Runs the resource test for one candidate. A rule without a resource
    /// test accepts every resource.
    pub fn match_resource<'a>(&self, resource: &'a str, query: &'a str) -> Option<ResourceMatch<'a>> {
        match &self.resource {
            Some(test) if !test(resource) => None,
            _ => Some(ResourceMatch::new(resource, query)),
        }
    }

    /// Runs the query test against the match the resource test produced.
    pub fn match_query(&self, matched: &ResourceMatch<'_>) -> bool {
        self.resource_query
            .as_ref()
            .map_or(true, |test| test(matched))
    }

    pub fn matches(&self, resource: &str, query: &str) -> bool {
        self.match_resource(resource, query)
            .is_some_and(|matched| self.match_query(&matched))
    }
}

impl fmt::Debug for NormalizedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedRule")
            .field("resource", &self.resource.is_some())
            .field("resource_query", &self.resource_query.is_some())
            .field("enforce", &self.enforce)
            .field("use_entries", &self.use_entries)
            .field("one_of", &self.one_of)
            .finish()
    }
}

/// Loader entries contributed by one matching rule (or `oneOf` branch).
#[derive(Debug, Clone, PartialEq)]
pub struct RuleEffect {
    pub enforce: Option<Enforce>,
    pub entries: Vec<UseEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedRuleSet {
    pub rules: Vec<NormalizedRule>,
    /// Options objects by ident, for `loader??ident` requests.
    pub references: BTreeMap<String, LoaderOptions>,
}

impl NormalizedRuleSet {
    pub fn find_options_by_ident(&self, ident: &str) -> Result<&LoaderOptions, NormalizeError> {
        self.references
            .get(ident)
            .ok_or_else(|| NormalizeError::UnknownIdent(ident.to_string()))
    }

    /// Effects of every rule matching `resource` + `query`, in rule order.
    /// Within a `oneOf`, only the first matching branch contributes.
    pub fn exec(&self, resource: &str, query: &str) -> Vec<RuleEffect> {
        let mut effects = Vec::new();
        for rule in &self.rules {
            exec_rule(rule, resource, query, &mut effects);
        }
        effects
    }

    /// Loader list for a request: post loaders, normal loaders, pre loaders.
    pub fn loaders_for(&self, resource: &str, query: &str) -> Vec<UseEntry> {
        let effects = self.exec(resource, query);
        let phase = |enforce: Option<Enforce>| {
            effects
                .iter()
                .filter(move |effect| effect.enforce == enforce)
                .flat_map(|effect| effect.entries.iter().cloned())
        };
        phase(Some(Enforce::Post))
            .chain(phase(None))
            .chain(phase(Some(Enforce::Pre)))
            .collect()
    }
}

fn exec_rule(rule: &NormalizedRule, resource: &str, query: &str, effects: &mut Vec<RuleEffect>) -> bool {
    let Some(matched) = rule.match_resource(resource, query) else {
        return false;
    };
    if !rule.match_query(&matched) {
        return false;
    }

    if !rule.use_entries.is_empty() {
        effects.push(RuleEffect {
            enforce: rule.enforce,
            entries: rule.use_entries.clone(),
        });
    }

    if let Some(branches) = &rule.one_of {
        for branch in branches {
            if exec_rule(branch, resource, query, effects) {
                break;
            }
        }
    }

    true
}

/// Reference normalizer. Options objects without an `ident` get one derived
/// from their position (`ref--<rule>-<item>`), like bundlers do.
#[derive(Debug, Clone)]
pub struct RuleSetNormalizer {
    ident_prefix: String,
}

impl Default for RuleSetNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleSetNormalizer {
    pub fn new() -> Self {
        Self {
            ident_prefix: "ref-".to_string(),
        }
    }

    pub fn with_ident_prefix(ident_prefix: impl Into<String>) -> Self {
        Self {
            ident_prefix: ident_prefix.into(),
        }
    }

    fn normalize_rules(
        &self,
        rules: &[RawRule],
        ident: &str,
        references: &mut BTreeMap<String, LoaderOptions>,
    ) -> Result<Vec<NormalizedRule>, NormalizeError> {
        rules
            .iter()
            .enumerate()
            .map(|(idx, rule)| self.normalize_rule(rule, &format!("{ident}-{idx}"), references))
            .collect()
    }

    fn normalize_rule(
        &self,
        rule: &RawRule,
        ident: &str,
        references: &mut BTreeMap<String, LoaderOptions>,
    ) -> Result<NormalizedRule, NormalizeError> {
        let uses_test_source = rule.test.is_some() || rule.include.is_some() || rule.exclude.is_some();
        if uses_test_source && rule.resource.is_some() {
            return Err(NormalizeError::ConflictingResourceSource {
                existing: "test + include + exclude",
                new: "resource",
            });
        }

        let resource = if uses_test_source {
            let condition = crate::condition::ConditionObject {
                test: rule.test.clone(),
                include: rule.include.clone(),
                exclude: rule.exclude.clone(),
                ..Default::default()
            };
            Some(crate::condition::Condition::Object(Box::new(condition)).compile()?)
        } else {
            rule.resource.as_ref().map(|c| c.compile()).transpose()?
        };

        let resource_query = rule
            .resource_query
            .as_ref()
            .map(|c| c.compile_query())
            .transpose()?;

        let use_entries = match &rule.chain {
            None => Vec::new(),
            Some(chain) => normalize_chain(chain, ident)?,
        };
        for entry in &use_entries {
            if let (Some(entry_ident), Some(options)) = (&entry.ident, &entry.options) {
                references.insert(entry_ident.clone(), options.clone());
            }
        }

        let one_of = match &rule.one_of {
            Some(branches) => Some(self.normalize_rules(branches, &format!("{ident}-oneOf"), references)?),
            None => None,
        };

        Ok(NormalizedRule {
            resource,
            resource_query,
            enforce: rule.enforce,
            use_entries,
            one_of,
        })
    }
}

impl RuleNormalizer for RuleSetNormalizer {
    fn normalize(&self, rules: &[RawRule]) -> Result<NormalizedRuleSet, NormalizeError> {
        let mut references = BTreeMap::new();
        let rules = self.normalize_rules(rules, &self.ident_prefix, &mut references)?;
        Ok(NormalizedRuleSet { rules, references })
    }
}

/// Number of normalized entries each raw item of `chain` expands to, in order.
pub fn chain_item_widths(chain: &LoaderShorthand) -> Vec<usize> {
    match chain {
        LoaderShorthand::Loader { loader, options: None } => {
            vec![1; split_chained_loader(loader).len()]
        }
        LoaderShorthand::Loader { .. } => vec![1],
        LoaderShorthand::LoaderList(items) | LoaderShorthand::UseArray(items) => vec![1; items.len()],
    }
}

/// `"style-loader!css-loader"` -> `["style-loader", "css-loader"]`.
pub fn split_chained_loader(loader: &str) -> Vec<&str> {
    loader.split('!').filter(|part| !part.is_empty()).collect()
}

fn normalize_chain(chain: &LoaderShorthand, ident: &str) -> Result<Vec<UseEntry>, NormalizeError> {
    match chain {
        LoaderShorthand::Loader { loader, options: None } => Ok(split_chained_loader(loader)
            .into_iter()
            .map(normalize_request)
            .collect()),
        LoaderShorthand::Loader {
            loader,
            options: Some(options),
        } => {
            if loader.contains('!') {
                return Err(NormalizeError::OptionsOnChainedLoader(loader.clone()));
            }
            let entry = UseEntry {
                loader: loader.clone(),
                options: Some(options.clone()),
                ident: None,
            };
            Ok(vec![normalize_entry(&entry, ident)])
        }
        LoaderShorthand::LoaderList(items) | LoaderShorthand::UseArray(items) => Ok(items
            .iter()
            .enumerate()
            .map(|(idx, item)| normalize_item(item, &format!("{ident}-{idx}")))
            .collect()),
    }
}

fn normalize_item(item: &UseItem, ident: &str) -> UseEntry {
    match item {
        UseItem::Request(request) => normalize_request(request),
        UseItem::Entry(entry) => normalize_entry(entry, ident),
    }
}

fn normalize_request(request: &str) -> UseEntry {
    let (loader, query) = split_loader_request(request);
    UseEntry {
        loader: loader.to_string(),
        options: query.map(|query| LoaderOptions::Query(query.to_string())),
        ident: None,
    }
}

fn normalize_entry(entry: &UseEntry, ident: &str) -> UseEntry {
    let mut normalized = entry.clone();
    if normalized.ident.is_none() {
        if let Some(LoaderOptions::Object(_)) = &entry.options {
            normalized.ident = Some(
                entry
                    .options_ident()
                    .map(str::to_string)
                    .unwrap_or_else(|| ident.to_string()),
            );
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn rules(value: Value) -> Vec<RawRule> {
        serde_json::from_value(value).unwrap()
    }

    fn normalize(value: Value) -> NormalizedRuleSet {
        RuleSetNormalizer::new().normalize(&rules(value)).unwrap()
    }

    fn loader_names(entries: &[UseEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.loader.as_str()).collect()
    }

    #[test]
    fn test_loader_string_is_split_on_bang() {
        let set = normalize(json!([{ "test": { "regex": "\\.css$" }, "loader": "style-loader!css-loader?modules" }]));
        let entries = &set.rules[0].use_entries;
        assert_eq!(loader_names(entries), vec!["style-loader", "css-loader"]);
        assert_eq!(entries[1].options, Some(LoaderOptions::Query("modules".into())));
        assert_eq!(entries[1].ident, None);
    }

    #[test]
    fn test_loader_with_options_gets_rule_ident() {
        let set = normalize(json!([
            { "test": { "regex": "\\.js$" }, "use": ["a"] },
            { "test": { "regex": "\\.vue$" }, "loader": "vue-loader", "options": { "hotReload": false } }
        ]));
        let entry = &set.rules[1].use_entries[0];
        assert_eq!(entry.ident.as_deref(), Some("ref--1"));
        assert!(set.find_options_by_ident("ref--1").is_ok());
    }

    #[test]
    fn test_use_items_get_positional_idents_unless_provided() {
        let set = normalize(json!([{
            "test": { "regex": "\\.css$" },
            "use": [
                "style-loader",
                { "loader": "css-loader", "options": { "modules": true } },
                { "loader": "postcss-loader", "options": { "ident": "postcss" } },
                { "loader": "sass-loader", "options": {}, "ident": "explicit" }
            ]
        }]));
        let entries = &set.rules[0].use_entries;
        assert_eq!(entries[0].ident, None);
        assert_eq!(entries[1].ident.as_deref(), Some("ref--0-1"));
        assert_eq!(entries[2].ident.as_deref(), Some("postcss"));
        assert_eq!(entries[3].ident.as_deref(), Some("explicit"));
        assert_eq!(set.references.len(), 3);
        assert!(matches!(
            set.find_options_by_ident("missing"),
            Err(NormalizeError::UnknownIdent(_))
        ));
    }

    #[test]
    fn test_options_on_chained_loader_is_rejected() {
        let result = RuleSetNormalizer::new().normalize(&rules(json!([
            { "loader": "style-loader!css-loader", "options": { "modules": true } }
        ])));
        assert!(matches!(result, Err(NormalizeError::OptionsOnChainedLoader(_))));
    }

    #[test]
    fn test_test_and_resource_conflict() {
        let result = RuleSetNormalizer::new().normalize(&rules(json!([
            { "test": { "regex": "\\.js$" }, "resource": "/src", "use": ["a"] }
        ])));
        assert!(matches!(
            result,
            Err(NormalizeError::ConflictingResourceSource { .. })
        ));
    }

    #[test]
    fn test_resource_predicate_honours_include_and_exclude() {
        let set = normalize(json!([{
            "test": { "regex": "\\.js$" },
            "include": "/app/src",
            "exclude": { "regex": "node_modules" },
            "use": ["babel-loader"]
        }]));
        let rule = &set.rules[0];
        assert!(rule.matches("/app/src/main.js", ""));
        assert!(!rule.matches("/app/src/node_modules/x.js", ""));
        assert!(!rule.matches("/app/lib/main.js", ""));
    }

    #[test]
    fn test_exec_orders_post_normal_pre_and_stops_at_first_one_of_branch() {
        let set = normalize(json!([
            { "test": { "regex": "\\.css$" }, "enforce": "pre", "use": ["lint-loader"] },
            {
                "test": { "regex": "\\.css$" },
                "oneOf": [
                    { "resourceQuery": { "regex": "module" }, "use": ["css-loader?modules"] },
                    { "use": ["css-loader"] }
                ]
            },
            { "test": { "regex": "\\.css$" }, "enforce": "post", "use": ["report-loader"] },
            { "test": { "regex": "\\.js$" }, "use": ["babel-loader"] }
        ]));

        let plain = set.loaders_for("/src/a.css", "");
        assert_eq!(loader_names(&plain), vec!["report-loader", "css-loader", "lint-loader"]);
        assert_eq!(plain[1].options, None);

        let module = set.loaders_for("/src/a.css", "?module");
        assert_eq!(loader_names(&module), vec!["report-loader", "css-loader", "lint-loader"]);
        assert_eq!(module[1].options, Some(LoaderOptions::Query("modules".into())));

        assert!(set.loaders_for("/src/a.ts", "").is_empty());
    }

    #[test]
    fn test_rule_without_resource_test_matches_everything() {
        let set = normalize(json!([{ "loader": "pitcher-loader" }]));
        assert!(set.rules[0].matches("/anything.xyz", "?q"));
    }

    #[test]
    fn test_chain_item_widths() {
        let chained = LoaderShorthand::Loader {
            loader: "a!b!c".into(),
            options: None,
        };
        assert_eq!(chain_item_widths(&chained), vec![1, 1, 1]);
        let list = LoaderShorthand::UseArray(vec![UseItem::Request("a!b".into())]);
        assert_eq!(chain_item_widths(&list), vec![1]);
    }
}
