use crate::condition::Condition;
use crate::error::NormalizeError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Loader options bag.
pub type Options = Map<String, Value>;

/// Key under which a shared options bag carries its ident.
pub const IDENT_KEY: &str = "ident";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforce {
    Pre,
    Post,
}

/// Options as written in a rule: an object, or an inline query string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoaderOptions {
    Object(Options),
    Query(String),
}

impl LoaderOptions {
    pub fn as_object(&self) -> Option<&Options> {
        match self {
            LoaderOptions::Object(options) => Some(options),
            LoaderOptions::Query(_) => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Options> {
        match self {
            LoaderOptions::Object(options) => Some(options),
            LoaderOptions::Query(_) => None,
        }
    }
}

/// One step of a processing chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseEntry {
    pub loader: String,
    #[serde(default, alias = "query", skip_serializing_if = "Option::is_none")]
    pub options: Option<LoaderOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ident: Option<String>,
}

impl UseEntry {
    pub fn new(loader: impl Into<String>) -> Self {
        Self {
            loader: loader.into(),
            options: None,
            ident: None,
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = Some(LoaderOptions::Object(options));
        self
    }

    /// The ident stored inside the options object, if any.
    pub fn options_ident(&self) -> Option<&str> {
        self.options
            .as_ref()
            .and_then(LoaderOptions::as_object)
            .and_then(|options| options.get(IDENT_KEY))
            .and_then(Value::as_str)
    }
}

/// A raw chain item: `"css-loader?modules"` or `{ loader, options, ident }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UseItem {
    Request(String),
    Entry(UseEntry),
}

/// The shorthand a raw rule used to spell its processing chain.
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderShorthand {
    /// `loader: "a!b"`, optionally with `options` (only for a single loader).
    Loader {
        loader: String,
        options: Option<LoaderOptions>,
    },
    /// `loaders: [...]`
    LoaderList(Vec<UseItem>),
    /// `use: [...]`
    UseArray(Vec<UseItem>),
}

impl LoaderShorthand {
    pub fn source_name(&self) -> &'static str {
        match self {
            LoaderShorthand::Loader { .. } => "loader",
            LoaderShorthand::LoaderList(_) => "loaders",
            LoaderShorthand::UseArray(_) => "use",
        }
    }
}

/// A user-authored rule, as found in the host's rule list.
///
/// Keys this crate does not interpret (`type`, `parser`, `sideEffects`, ...)
/// are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RuleDef", into = "RuleDef")]
pub struct RawRule {
    pub test: Option<Condition>,
    pub include: Option<Condition>,
    pub exclude: Option<Condition>,
    pub resource: Option<Condition>,
    pub resource_query: Option<Condition>,
    pub enforce: Option<Enforce>,
    pub chain: Option<LoaderShorthand>,
    pub one_of: Option<Vec<RawRule>>,
    pub extra: Map<String, Value>,
}

impl RawRule {
    /// `{ test, use: [loaders...] }`
    pub fn with_use(test: Condition, loaders: &[&str]) -> Self {
        Self {
            test: Some(test),
            chain: Some(LoaderShorthand::UseArray(
                loaders
                    .iter()
                    .map(|loader| UseItem::Request(loader.to_string()))
                    .collect(),
            )),
            ..Self::default()
        }
    }

    /// `{ loader }` with no match conditions.
    pub fn loader_only(loader: impl Into<String>) -> Self {
        Self {
            chain: Some(LoaderShorthand::Loader {
                loader: loader.into(),
                options: None,
            }),
            ..Self::default()
        }
    }
}

// On-disk shape of a rule. Shorthand fields are validated into
// `LoaderShorthand` when converting to `RawRule`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    test: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    include: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exclude: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource_query: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enforce: Option<Enforce>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    loader: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<LoaderOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    query: Option<LoaderOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    loaders: Option<OneOrMany>,
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    use_items: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    one_of: Option<Vec<RawRule>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<UseItem>),
    One(UseItem),
}

impl From<OneOrMany> for Vec<UseItem> {
    fn from(items: OneOrMany) -> Self {
        match items {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

impl TryFrom<RuleDef> for RawRule {
    type Error = NormalizeError;

    fn try_from(def: RuleDef) -> Result<Self, Self::Error> {
        let options = match (def.options, def.query) {
            (Some(_), Some(_)) => return Err(NormalizeError::DuplicateOptions),
            (options, query) => options.or(query),
        };

        let chain = match (def.loader, def.loaders, def.use_items) {
            (Some(_), Some(_), _) => {
                return Err(NormalizeError::ConflictingUseSource {
                    existing: "loader",
                    new: "loaders",
                })
            }
            (Some(_), _, Some(_)) => {
                return Err(NormalizeError::ConflictingUseSource {
                    existing: "loader",
                    new: "use",
                })
            }
            (_, Some(_), Some(_)) => {
                return Err(NormalizeError::ConflictingUseSource {
                    existing: "loaders",
                    new: "use",
                })
            }
            (Some(loader), None, None) => Some(LoaderShorthand::Loader { loader, options }),
            (None, loaders, use_items) => {
                if options.is_some() {
                    return Err(NormalizeError::OptionsWithoutLoader);
                }
                match (loaders, use_items) {
                    (Some(loaders), _) => Some(LoaderShorthand::LoaderList(loaders.into())),
                    (None, Some(use_items)) => Some(LoaderShorthand::UseArray(use_items.into())),
                    (None, None) => None,
                }
            }
        };

        Ok(RawRule {
            test: def.test,
            include: def.include,
            exclude: def.exclude,
            resource: def.resource,
            resource_query: def.resource_query,
            enforce: def.enforce,
            chain,
            one_of: def.one_of,
            extra: def.extra,
        })
    }
}

impl From<RawRule> for RuleDef {
    fn from(rule: RawRule) -> Self {
        let mut def = RuleDef {
            test: rule.test,
            include: rule.include,
            exclude: rule.exclude,
            resource: rule.resource,
            resource_query: rule.resource_query,
            enforce: rule.enforce,
            one_of: rule.one_of,
            extra: rule.extra,
            ..RuleDef::default()
        };
        match rule.chain {
            Some(LoaderShorthand::Loader { loader, options }) => {
                def.loader = Some(loader);
                def.options = options;
            }
            Some(LoaderShorthand::LoaderList(items)) => def.loaders = Some(OneOrMany::Many(items)),
            Some(LoaderShorthand::UseArray(items)) => def.use_items = Some(OneOrMany::Many(items)),
            None => {}
        }
        def
    }
}
