// Match conditions over resource paths and resource queries.
//
// A rules file spells conditions the way bundler configs do: a string is a
// path prefix, `{ regex: "..." }` is a pattern, an array is "any of", and an
// object combines `test` / `include` / `exclude` / `and` / `or` / `not`.
// Predicates and component queries only exist in memory.

use crate::error::NormalizeError;
use crate::query::SyntheticResourceQuery;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Compiled test over a resource path (or, for query conditions, a query string).
pub type ResourcePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Compiled test over a resource query. It receives the [`ResourceMatch`]
/// produced by the same rule's resource test, never a bare string.
pub type QueryPredicate = Arc<dyn Fn(&ResourceMatch<'_>) -> bool + Send + Sync>;

/// The candidate a rule's resource test accepted, handed to its query test.
///
/// Only `NormalizedRule::match_resource` hands these out, so a query test
/// always runs after, and against, the resource test of the same candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceMatch<'a> {
    resource: &'a str,
    query: &'a str,
}

impl<'a> ResourceMatch<'a> {
    pub(crate) fn new(resource: &'a str, query: &'a str) -> Self {
        Self { resource, query }
    }

    /// Resource path without its query.
    pub fn resource(&self) -> &'a str {
        self.resource
    }

    /// Raw query string including the leading `?`, or empty.
    pub fn query(&self) -> &'a str {
        self.query
    }
}

/// A host-supplied boolean test, kept by name for diagnostics.
#[derive(Clone)]
pub struct Predicate {
    name: String,
    test: ResourcePredicate,
}

impl Predicate {
    pub fn new<F>(name: impl Into<String>, test: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            test: Arc::new(test),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn test(&self, value: &str) -> bool {
        (self.test)(value)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.name).finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Condition {
    /// Matches values starting with the string.
    Prefix(String),
    /// Regex plus the JS-style flags it was written with.
    Pattern { regex: Regex, flags: String },
    /// Matches when any member matches; an empty list never matches.
    AnyOf(Vec<Condition>),
    Object(Box<ConditionObject>),
    Predicate(Predicate),
    /// Query test installed on cloned rules for virtual component blocks.
    Component(ComponentQuery),
}

#[derive(Debug, Clone, Default)]
pub struct ConditionObject {
    pub test: Option<Condition>,
    pub include: Option<Condition>,
    pub exclude: Option<Condition>,
    pub and: Option<Vec<Condition>>,
    pub or: Option<Vec<Condition>>,
    pub not: Option<Condition>,
}

impl Condition {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Condition::Prefix(prefix.into())
    }

    /// Builds a pattern condition, e.g. `Condition::regex(r"\.css$")`.
    pub fn regex(pattern: &str) -> Result<Self, NormalizeError> {
        compile_regex(pattern, "")
    }

    pub fn predicate<F>(name: impl Into<String>, test: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Condition::Predicate(Predicate::new(name, test))
    }

    /// Compiles this condition into a plain string test.
    pub fn compile(&self) -> Result<ResourcePredicate, NormalizeError> {
        match self {
            Condition::Prefix(prefix) => {
                if prefix.is_empty() {
                    return Err(NormalizeError::EmptyCondition);
                }
                let prefix = prefix.clone();
                Ok(Arc::new(move |value: &str| value.starts_with(&prefix)))
            }
            Condition::Pattern { regex, .. } => {
                let regex = regex.clone();
                Ok(Arc::new(move |value: &str| regex.is_match(value)))
            }
            Condition::AnyOf(items) => Ok(any_of(compile_all(items)?)),
            Condition::Object(object) => object.compile(),
            Condition::Predicate(predicate) => {
                let predicate = predicate.clone();
                Ok(Arc::new(move |value: &str| predicate.test(value)))
            }
            Condition::Component(_) => Err(NormalizeError::MisplacedComponentQuery),
        }
    }

    /// Compiles this condition as a resource query test.
    pub fn compile_query(&self) -> Result<QueryPredicate, NormalizeError> {
        if let Condition::Component(component) = self {
            let component = component.clone();
            return Ok(query_predicate(move |matched| component.matches(matched)));
        }
        let test = self.compile()?;
        Ok(query_predicate(move |matched| test(matched.query())))
    }
}

impl ConditionObject {
    fn compile(&self) -> Result<ResourcePredicate, NormalizeError> {
        let mut matchers = Vec::new();
        if let Some(test) = &self.test {
            matchers.push(test.compile()?);
        }
        if let Some(include) = &self.include {
            matchers.push(include.compile()?);
        }
        if let Some(and) = &self.and {
            matchers.push(all_of(compile_all(and)?));
        }
        if let Some(or) = &self.or {
            matchers.push(any_of(compile_all(or)?));
        }
        if let Some(not) = &self.not {
            matchers.push(negate(not.compile()?));
        }
        if let Some(exclude) = &self.exclude {
            matchers.push(negate(exclude.compile()?));
        }

        match matchers.len() {
            0 => Err(NormalizeError::EmptyCondition),
            1 => Ok(matchers.remove(0)),
            _ => Ok(all_of(matchers)),
        }
    }
}

fn query_predicate<F>(test: F) -> QueryPredicate
where
    F: Fn(&ResourceMatch<'_>) -> bool + Send + Sync + 'static,
{
    Arc::new(test)
}

fn compile_all(items: &[Condition]) -> Result<Vec<ResourcePredicate>, NormalizeError> {
    items.iter().map(Condition::compile).collect()
}

fn any_of(matchers: Vec<ResourcePredicate>) -> ResourcePredicate {
    Arc::new(move |value: &str| matchers.iter().any(|m| m(value)))
}

fn all_of(matchers: Vec<ResourcePredicate>) -> ResourcePredicate {
    Arc::new(move |value: &str| matchers.iter().all(|m| m(value)))
}

fn negate(matcher: ResourcePredicate) -> ResourcePredicate {
    Arc::new(move |value: &str| !matcher(value))
}

fn compile_regex(pattern: &str, flags: &str) -> Result<Condition, NormalizeError> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            // no-ops for a single test
            'g' | 'y' | 'u' => &mut builder,
            other => {
                return Err(NormalizeError::InvalidRegexFlag {
                    pattern: pattern.to_string(),
                    flag: other,
                })
            }
        };
    }
    builder
        .build()
        .map(|regex| Condition::Pattern {
            regex,
            flags: flags.to_string(),
        })
        .map_err(|source| NormalizeError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })
}

// ============================================================================
// COMPONENT QUERY - MATCHES VIRTUAL BLOCK REQUESTS AGAINST A USER RULE
// ============================================================================

/// Query test of a cloned rule.
///
/// Accepts `<name>.<ext>?...&<lang_key>=<lang>` when the user rule it was
/// cloned from accepts `<name>.<lang>` and the original query.
#[derive(Clone)]
pub struct ComponentQuery {
    extension: String,
    lang_key: String,
    resource: Option<ResourcePredicate>,
    resource_query: Option<QueryPredicate>,
}

impl ComponentQuery {
    pub fn new(
        extension: impl Into<String>,
        lang_key: impl Into<String>,
        resource: Option<ResourcePredicate>,
        resource_query: Option<QueryPredicate>,
    ) -> Self {
        Self {
            extension: extension.into(),
            lang_key: lang_key.into(),
            resource,
            resource_query,
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn matches(&self, matched: &ResourceMatch<'_>) -> bool {
        let parsed = SyntheticResourceQuery::parse(matched.query());

        if let Some(resource) = &self.resource {
            let Some(lang) = parsed.get(&self.lang_key) else {
                return false;
            };
            let fake_resource_path = format!("{}.{}", self.strip_extension(matched.resource()), lang);
            if !resource(&fake_resource_path) {
                return false;
            }
        }

        if let Some(resource_query) = &self.resource_query {
            if !resource_query(matched) {
                return false;
            }
        }

        true
    }

    fn strip_extension<'a>(&self, resource: &'a str) -> &'a str {
        resource
            .strip_suffix(self.extension.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .unwrap_or(resource)
    }
}

impl fmt::Debug for ComponentQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentQuery")
            .field("extension", &self.extension)
            .field("lang_key", &self.lang_key)
            .field("resource", &self.resource.is_some())
            .field("resource_query", &self.resource_query.is_some())
            .finish()
    }
}

// ============================================================================
// SERDE - CONDITIONS AS PLAIN JSON VALUES
// ============================================================================

impl From<Condition> for Value {
    fn from(condition: Condition) -> Self {
        match condition {
            Condition::Prefix(prefix) => Value::String(prefix),
            Condition::Pattern { regex, flags } => {
                let mut object = Map::new();
                object.insert("regex".into(), Value::String(regex.as_str().to_string()));
                if !flags.is_empty() {
                    object.insert("flags".into(), Value::String(flags));
                }
                Value::Object(object)
            }
            Condition::AnyOf(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Condition::Object(object) => {
                let ConditionObject {
                    test,
                    include,
                    exclude,
                    and,
                    or,
                    not,
                } = *object;
                let mut map = Map::new();
                let mut put = |key: &str, value: Option<Value>| {
                    if let Some(value) = value {
                        map.insert(key.to_string(), value);
                    }
                };
                put("test", test.map(Value::from));
                put("include", include.map(Value::from));
                put("exclude", exclude.map(Value::from));
                put("and", and.map(|items| Value::Array(items.into_iter().map(Value::from).collect())));
                put("or", or.map(|items| Value::Array(items.into_iter().map(Value::from).collect())));
                put("not", not.map(Value::from));
                Value::Object(map)
            }
            Condition::Predicate(predicate) => {
                let mut object = Map::new();
                object.insert("predicate".into(), Value::String(predicate.name));
                Value::Object(object)
            }
            Condition::Component(component) => {
                let mut inner = Map::new();
                inner.insert("extension".into(), Value::String(component.extension));
                inner.insert("langKey".into(), Value::String(component.lang_key));
                inner.insert("resource".into(), Value::Bool(component.resource.is_some()));
                inner.insert(
                    "resourceQuery".into(),
                    Value::Bool(component.resource_query.is_some()),
                );
                let mut object = Map::new();
                object.insert("component".into(), Value::Object(inner));
                Value::Object(object)
            }
        }
    }
}

impl TryFrom<Value> for Condition {
    type Error = NormalizeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(prefix) if prefix.is_empty() => Err(NormalizeError::EmptyCondition),
            Value::String(prefix) => Ok(Condition::Prefix(prefix)),
            Value::Array(items) => items
                .into_iter()
                .map(Condition::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(Condition::AnyOf),
            Value::Object(map) => condition_from_object(map),
            other => Err(NormalizeError::UnsupportedCondition(other.to_string())),
        }
    }
}

fn condition_from_object(mut map: Map<String, Value>) -> Result<Condition, NormalizeError> {
    if map.contains_key("predicate") {
        return Err(NormalizeError::NotDeserializable("Predicate"));
    }
    if map.contains_key("component") {
        return Err(NormalizeError::NotDeserializable("Component query"));
    }

    if let Some(pattern) = map.remove("regex") {
        let Value::String(pattern) = pattern else {
            return Err(NormalizeError::UnsupportedCondition(pattern.to_string()));
        };
        let flags = match map.remove("flags") {
            None => String::new(),
            Some(Value::String(flags)) => flags,
            Some(other) => return Err(NormalizeError::UnsupportedCondition(other.to_string())),
        };
        if let Some(key) = map.keys().next() {
            return Err(NormalizeError::UnexpectedConditionKey(key.clone()));
        }
        return compile_regex(&pattern, &flags);
    }

    let mut object = ConditionObject::default();
    for (key, value) in map {
        match key.as_str() {
            "test" => object.test = Some(Condition::try_from(value)?),
            "include" => object.include = Some(Condition::try_from(value)?),
            "exclude" => object.exclude = Some(Condition::try_from(value)?),
            "not" => object.not = Some(Condition::try_from(value)?),
            "and" => object.and = Some(condition_list(value)?),
            "or" => object.or = Some(condition_list(value)?),
            _ => return Err(NormalizeError::UnexpectedConditionKey(key)),
        }
    }
    Ok(Condition::Object(Box::new(object)))
}

fn condition_list(value: Value) -> Result<Vec<Condition>, NormalizeError> {
    match value {
        Value::Array(items) => items.into_iter().map(Condition::try_from).collect(),
        single => Ok(vec![Condition::try_from(single)?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compiled(value: Value) -> ResourcePredicate {
        Condition::try_from(value).unwrap().compile().unwrap()
    }

    #[test]
    fn test_string_condition_is_prefix_match() {
        let test = compiled(json!("/project/src"));
        assert!(test("/project/src/App.vue"));
        assert!(!test("/project/node_modules/lib/index.js"));
    }

    #[test]
    fn test_regex_condition_with_flags() {
        let test = compiled(json!({ "regex": "\\.CSS$", "flags": "i" }));
        assert!(test("main.css"));
        assert!(!test("main.scss.js"));
    }

    #[test]
    fn test_array_condition_is_any_of() {
        let test = compiled(json!([{ "regex": "\\.js$" }, { "regex": "\\.ts$" }]));
        assert!(test("a.ts"));
        assert!(test("a.js"));
        assert!(!test("a.css"));

        let never = compiled(json!([]));
        assert!(!never("anything"));
    }

    #[test]
    fn test_object_condition_combines_test_include_exclude() {
        let test = compiled(json!({
            "test": { "regex": "\\.js$" },
            "include": "/project/src",
            "exclude": { "regex": "vendor" }
        }));
        assert!(test("/project/src/main.js"));
        assert!(!test("/project/src/vendor/jquery.js"));
        assert!(!test("/project/lib/main.js"));
        assert!(!test("/project/src/main.ts"));
    }

    #[test]
    fn test_and_or_not() {
        let test = compiled(json!({
            "and": [{ "regex": "^/app" }],
            "or": [{ "regex": "\\.js$" }, { "regex": "\\.mjs$" }],
            "not": { "regex": "\\.spec\\." }
        }));
        assert!(test("/app/a.mjs"));
        assert!(!test("/app/a.spec.js"));
        assert!(!test("/lib/a.js"));
    }

    #[test]
    fn test_invalid_conditions_are_rejected() {
        assert!(matches!(
            Condition::try_from(json!("")),
            Err(NormalizeError::EmptyCondition)
        ));
        assert!(matches!(
            Condition::try_from(json!({ "issuer": "x" })),
            Err(NormalizeError::UnexpectedConditionKey(key)) if key == "issuer"
        ));
        assert!(matches!(
            Condition::try_from(json!({ "regex": "(" })),
            Err(NormalizeError::InvalidRegex { .. })
        ));
        assert!(matches!(
            Condition::try_from(json!(42)),
            Err(NormalizeError::UnsupportedCondition(_))
        ));
        assert!(matches!(
            Condition::try_from(json!({})).unwrap().compile(),
            Err(NormalizeError::EmptyCondition)
        ));
    }

    #[test]
    fn test_regex_flags_survive_serialization() {
        let value = json!({ "regex": "\\.CSS$", "flags": "i" });
        let condition = Condition::try_from(value.clone()).unwrap();
        let written = Value::from(condition);
        assert_eq!(written, value);

        let reread = Condition::try_from(written).unwrap().compile().unwrap();
        assert!(reread("a.css"));
        assert!(reread("a.CSS"));
    }

    #[test]
    fn test_predicate_condition() {
        let condition = Condition::predicate("is-test-file", |path| path.contains(".test."));
        let test = condition.compile().unwrap();
        assert!(test("a.test.js"));
        assert!(!test("a.js"));
        assert_eq!(Value::from(condition), json!({ "predicate": "is-test-file" }));
    }

    #[test]
    fn test_condition_serializes_back_to_json() {
        let value = json!({ "test": { "regex": "\\.js$" }, "exclude": ["/a", "/b"] });
        let condition = Condition::try_from(value.clone()).unwrap();
        assert_eq!(Value::from(condition), value);
    }

    #[test]
    fn test_component_query_is_query_only() {
        let component = Condition::Component(ComponentQuery::new("vue", "lang", None, None));
        assert!(matches!(
            component.compile(),
            Err(NormalizeError::MisplacedComponentQuery)
        ));
        assert!(component.compile_query().is_ok());
    }

    #[test]
    fn test_component_query_rebuilds_block_path() {
        let css = Condition::regex(r"\.css$").unwrap().compile().unwrap();
        let component = ComponentQuery::new("vue", "lang", Some(css), None);

        assert!(component.matches(&ResourceMatch::new("/src/App.vue", "?vue&lang=css")));
        assert!(!component.matches(&ResourceMatch::new("/src/App.vue", "?vue&lang=js")));
        assert!(!component.matches(&ResourceMatch::new("/src/App.vue", "?vue")));
    }

    #[test]
    fn test_component_query_without_resource_test_checks_only_query() {
        let module = Condition::regex("module").unwrap().compile_query().unwrap();
        let component = ComponentQuery::new("vue", "lang", None, Some(module));

        assert!(component.matches(&ResourceMatch::new("/src/App.vue", "?vue&module")));
        assert!(!component.matches(&ResourceMatch::new("/src/App.vue", "?vue&lang=css")));
    }
}
