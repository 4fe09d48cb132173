use thiserror::Error;

/// Fatal failures of the rule rewriting pass.
///
/// None of these are recoverable: each one means the host configuration is
/// inconsistent and continuing would produce silently wrong build output.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error(
        "[{plugin} Error] No matching rule for .{extension} files found.\n\
         Make sure there is at least one root-level rule that matches .{extension} files."
    )]
    NoMatchingRule { plugin: String, extension: String },

    #[error(
        "[{plugin} Error] Found {} root-level rules matching .{extension} files (rules {indices:?}).\n\
         Keep exactly one root-level rule for .{extension} files.",
        .indices.len()
    )]
    AmbiguousRule {
        plugin: String,
        extension: String,
        indices: Vec<usize>,
    },

    #[error(
        "[{plugin} Error] The rule matching .{extension} files (rule {index}) uses oneOf, \
         which is not supported."
    )]
    UnsupportedBranching {
        plugin: String,
        extension: String,
        index: usize,
    },

    #[error(
        "[{plugin} Error] No matching use for {loader} is found.\n\
         Make sure the rule matching .{extension} files include {loader} in its use."
    )]
    NoCompilerInUse {
        plugin: String,
        loader: String,
        extension: String,
    },

    #[error(
        "[{plugin} Error] Rule {index} has no loader, loaders or use to attach options to. \
         This should not happen, please open an issue with your bundler config."
    )]
    UnreachableShorthand { plugin: String, index: usize },

    #[error("normalized rules are not aligned with raw rules ({raw} raw, {normalized} normalized)")]
    Misaligned { raw: usize, normalized: usize },

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// Errors raised while parsing or normalizing raw rules.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Expected condition but got an empty value")]
    EmptyCondition,

    #[error("Unexpected property {0} in condition")]
    UnexpectedConditionKey(String),

    #[error("Unsupported condition value: {0}")]
    UnsupportedCondition(String),

    #[error("Invalid regex condition {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown regex flag {flag:?} in condition {pattern:?}")]
    InvalidRegexFlag { pattern: String, flag: char },

    #[error("{0} conditions only exist in memory and cannot be read from a rules file")]
    NotDeserializable(&'static str),

    #[error("A component query condition can only be used as resourceQuery")]
    MisplacedComponentQuery,

    #[error("Rule can only have one resource source (provided {new} and {existing})")]
    ConflictingResourceSource {
        existing: &'static str,
        new: &'static str,
    },

    #[error("Rule can only have one result source (provided {new} and {existing})")]
    ConflictingUseSource {
        existing: &'static str,
        new: &'static str,
    },

    #[error("options/query cannot be used with loaders (use options for each array item): {0}")]
    OptionsOnChainedLoader(String),

    #[error("options/query provided without a loader")]
    OptionsWithoutLoader,

    #[error("Provided options and query in the same rule")]
    DuplicateOptions,

    #[error("Invalid loader query {query:?}: {reason}")]
    InvalidLoaderQuery { query: String, reason: String },

    #[error("Can not find options with ident '{0}'")]
    UnknownIdent(String),
}

/// Errors in the plugin configuration itself.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("component extension must not be empty")]
    EmptyExtension,

    #[error("ident token must not be empty")]
    EmptyIdent,

    #[error("invalid {field} pattern {pattern:?}: {source}")]
    InvalidPattern {
        field: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
