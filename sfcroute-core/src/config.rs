use crate::error::ConfigError;
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

// Default value functions for serde
fn default_plugin_name() -> String {
    "VueLoaderPlugin".to_string()
}

fn default_extension() -> String {
    "vue".to_string()
}

fn default_probe_stem() -> String {
    "foo".to_string()
}

fn default_compiler_loader_name() -> String {
    "vue-loader".to_string()
}

fn default_compiler_loader_pattern() -> String {
    r"^vue-loader|(/|\\)vue-loader".to_string()
}

fn default_ident() -> String {
    "vue-loader-options".to_string()
}

fn default_ident_blacklist() -> String {
    "babel-loader".to_string()
}

fn default_pitcher_loader() -> String {
    "vue-loader/lib/loaders/pitch.js".to_string()
}

fn default_lang_key() -> String {
    "lang".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Name used in error messages, e.g. `[VueLoaderPlugin Error]`
    #[serde(default = "default_plugin_name")]
    pub plugin_name: String,
    /// Component file extension, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,
    /// File stem of the probe path used to find the component rule (`foo.vue`)
    #[serde(default = "default_probe_stem")]
    pub probe_stem: String,
    /// Loader name shown in "no matching use" errors
    #[serde(default = "default_compiler_loader_name")]
    pub compiler_loader_name: String,
    /// Regex identifying the compiler loader inside the component rule's chain
    #[serde(default = "default_compiler_loader_pattern")]
    pub compiler_loader_pattern: String,
    /// Ident the compiler loader's options are shared under
    #[serde(default = "default_ident")]
    pub ident: String,
    /// Regex of loaders whose options must never receive an `ident` key
    #[serde(default = "default_ident_blacklist")]
    pub ident_blacklist: String,
    /// Loader request of the injected pitcher rule
    #[serde(default = "default_pitcher_loader")]
    pub pitcher_loader: String,
    /// Query key naming a virtual block's language
    #[serde(default = "default_lang_key")]
    pub lang_key: String,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            plugin_name: default_plugin_name(),
            extension: default_extension(),
            probe_stem: default_probe_stem(),
            compiler_loader_name: default_compiler_loader_name(),
            compiler_loader_pattern: default_compiler_loader_pattern(),
            ident: default_ident(),
            ident_blacklist: default_ident_blacklist(),
            pitcher_loader: default_pitcher_loader(),
            lang_key: default_lang_key(),
        }
    }
}

impl PluginConfig {
    /// Load config from a YAML file
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PluginConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load config with fallback to default
    pub fn load_with_fallback(path: Option<&str>) -> Self {
        match path {
            Some(p) => Self::load_from_file(p).unwrap_or_else(|err| {
                warn!(path = p, error = %err, "failed to load plugin config, using defaults");
                Self::default()
            }),
            None => Self::default(),
        }
    }

    /// Validates the config and compiles its patterns.
    pub fn compile(&self) -> Result<PluginSettings, ConfigError> {
        let extension = self.extension.trim_start_matches('.');
        if extension.is_empty() {
            return Err(ConfigError::EmptyExtension);
        }
        if self.ident.is_empty() {
            return Err(ConfigError::EmptyIdent);
        }

        let component_pattern = format!(r"\.{}$", regex::escape(extension));
        Ok(PluginSettings {
            plugin_name: self.plugin_name.clone(),
            extension: extension.to_string(),
            probe_resource: format!("{}.{}", self.probe_stem, extension),
            compiler_loader_name: self.compiler_loader_name.clone(),
            compiler_loader: pattern("compiler_loader_pattern", &self.compiler_loader_pattern)?,
            ident: self.ident.clone(),
            ident_blacklist: pattern("ident_blacklist", &self.ident_blacklist)?,
            component_resource: pattern("extension", &component_pattern)?,
            pitcher_loader: self.pitcher_loader.clone(),
            lang_key: self.lang_key.clone(),
        })
    }
}

fn pattern(field: &'static str, source: &str) -> Result<Regex, ConfigError> {
    Regex::new(source).map_err(|err| ConfigError::InvalidPattern {
        field,
        pattern: source.to_string(),
        source: err,
    })
}

/// A validated [`PluginConfig`] with its patterns compiled.
#[derive(Debug, Clone)]
pub struct PluginSettings {
    pub plugin_name: String,
    pub extension: String,
    /// `<probe_stem>.<extension>`
    pub probe_resource: String,
    pub compiler_loader_name: String,
    pub compiler_loader: Regex,
    pub ident: String,
    pub ident_blacklist: Regex,
    /// `\.<extension>$`
    pub component_resource: Regex,
    pub pitcher_loader: String,
    pub lang_key: String,
}

impl Default for PluginSettings {
    fn default() -> Self {
        // the default patterns are constants, so compiling them cannot fail
        match PluginConfig::default().compile() {
            Ok(settings) => settings,
            Err(err) => unreachable!("default plugin config is invalid: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_component_conventions() {
        let settings = PluginSettings::default();
        assert_eq!(settings.probe_resource, "foo.vue");
        assert!(settings.compiler_loader.is_match("vue-loader"));
        assert!(settings.compiler_loader.is_match("/abs/node_modules/vue-loader/lib/index.js"));
        assert!(settings.compiler_loader.is_match(r"C:\deps\vue-loader"));
        assert!(!settings.compiler_loader.is_match("my-vue-loader-wrapper"));
        assert!(settings.component_resource.is_match("/src/App.vue"));
        assert!(!settings.component_resource.is_match("/src/App.vue.js"));
    }

    #[test]
    fn test_partial_yaml_uses_defaults_for_omitted_keys() {
        let config: PluginConfig = serde_yaml::from_str("extension: svelte\nident: svelte-options\n").unwrap();
        assert_eq!(config.extension, "svelte");
        assert_eq!(config.ident, "svelte-options");
        assert_eq!(config.lang_key, "lang");
        assert_eq!(config.pitcher_loader, default_pitcher_loader());

        let settings = config.compile().unwrap();
        assert_eq!(settings.probe_resource, "foo.svelte");
    }

    #[test]
    fn test_compile_rejects_bad_values() {
        let config = PluginConfig {
            extension: ".".into(),
            ..PluginConfig::default()
        };
        assert!(matches!(config.compile(), Err(ConfigError::EmptyExtension)));

        let config = PluginConfig {
            compiler_loader_pattern: "(".into(),
            ..PluginConfig::default()
        };
        assert!(matches!(
            config.compile(),
            Err(ConfigError::InvalidPattern { field: "compiler_loader_pattern", .. })
        ));
    }

    #[test]
    fn test_extension_with_leading_dot_is_accepted() {
        let config = PluginConfig {
            extension: ".riot".into(),
            ..PluginConfig::default()
        };
        let settings = config.compile().unwrap();
        assert_eq!(settings.extension, "riot");
        assert!(settings.component_resource.is_match("tag.riot"));
    }

    #[test]
    fn test_load_from_file_and_fallback() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "plugin_name: SveltePlugin\nextension: svelte").unwrap();
        let path = file.path().to_str().unwrap();

        let config = PluginConfig::load_from_file(path).unwrap();
        assert_eq!(config.plugin_name, "SveltePlugin");

        let fallback = PluginConfig::load_with_fallback(Some("/definitely/not/here.yaml"));
        assert_eq!(fallback, PluginConfig::default());
        assert_eq!(PluginConfig::load_with_fallback(None), PluginConfig::default());
    }
}
