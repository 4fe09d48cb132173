// Rules file handling for the CLI.
//
// A rules file is YAML or JSON holding either a bare rule list or a bundler
// config with `module.rules`. Everything else in a config document is kept
// so the rewritten rules can be written back in place.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde_json::Value;
use sfcroute_core::RawRule;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, PartialEq)]
enum Shape {
    List,
    /// Full config document; rules live at `module.rules`.
    Config(Value),
}

#[derive(Debug, Clone)]
pub struct RulesFile {
    shape: Shape,
    pub rules: Vec<RawRule>,
}

impl RulesFile {
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("failed to read rules file {path}"))?;
        Self::parse(&content, is_json_path(path)).with_context(|| format!("invalid rules file {path}"))
    }

    pub fn parse(content: &str, json: bool) -> Result<Self> {
        let document: Value = if json {
            serde_json::from_str(content)?
        } else {
            serde_yaml::from_str(content)?
        };

        match document {
            Value::Array(_) => Ok(Self {
                rules: serde_json::from_value(document)?,
                shape: Shape::List,
            }),
            Value::Object(_) => {
                let Some(rules) = document.pointer("/module/rules") else {
                    bail!("expected a rule list or a config with module.rules");
                };
                Ok(Self {
                    rules: serde_json::from_value(rules.clone())?,
                    shape: Shape::Config(document),
                })
            }
            _ => bail!("expected a rule list or a config with module.rules"),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self.shape, Shape::Config(_))
    }

    /// The document with its rules replaced by `rules`.
    pub fn with_rules(&self, rules: &[RawRule]) -> Result<Value> {
        let rules = serde_json::to_value(rules)?;
        match &self.shape {
            Shape::List => Ok(rules),
            Shape::Config(document) => {
                let mut document = document.clone();
                match document.pointer_mut("/module/rules") {
                    Some(slot) => *slot = rules,
                    None => bail!("config document lost its module.rules"),
                }
                Ok(document)
            }
        }
    }
}

fn is_json_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

pub fn write_document(value: &Value, output_path: &str, format: OutputFormat) -> Result<()> {
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    std::fs::write(output_path, content).with_context(|| format!("failed to write {output_path}"))?;
    Ok(())
}

/// Default output path: `<input-stem>_sfcroute.<ext>` next to the working directory.
pub fn default_output_path(input: &str, format: OutputFormat) -> String {
    let stem = Path::new(input)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("rules");
    let ext = match format {
        OutputFormat::Json => "json",
        OutputFormat::Yaml => "yaml",
    };
    format!("{stem}_sfcroute.{ext}")
}

/// `/src/App.vue?vue&lang=css` -> (`/src/App.vue`, `?vue&lang=css`)
pub fn split_probe(request: &str) -> (&str, &str) {
    match request.find('?') {
        Some(at) => request.split_at(at),
        None => (request, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_parse_bare_yaml_list() {
        let file = RulesFile::parse("- test: { regex: \\.vue$ }\n  loader: vue-loader\n", false).unwrap();
        assert_eq!(file.rules.len(), 1);
        assert!(!file.is_config());
    }

    #[test]
    fn test_config_document_keeps_other_keys() {
        let content = r#"{
            "mode": "production",
            "module": { "noParse": "jquery", "rules": [{ "test": { "regex": "\\.vue$" }, "use": ["vue-loader"] }] }
        }"#;
        let file = RulesFile::parse(content, true).unwrap();
        assert!(file.is_config());

        let written = file.with_rules(&[RawRule::loader_only("pitch")]).unwrap();
        assert_eq!(written["mode"], json!("production"));
        assert_eq!(written["module"]["noParse"], json!("jquery"));
        assert_eq!(written["module"]["rules"], json!([{ "loader": "pitch" }]));
    }

    #[test]
    fn test_rejects_documents_without_rules() {
        assert!(RulesFile::parse("{\"mode\": \"development\"}", true).is_err());
        assert!(RulesFile::parse("42", false).is_err());
    }

    #[test]
    fn test_load_and_write_round_trip() {
        let mut input = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(input, r#"[{{ "test": {{ "regex": "\\.css$" }}, "use": ["css-loader"] }}]"#).unwrap();
        let file = RulesFile::load(input.path().to_str().unwrap()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.yaml");
        let output = output.to_str().unwrap();
        write_document(&file.with_rules(&file.rules).unwrap(), output, OutputFormat::Yaml).unwrap();

        let reloaded = RulesFile::load(output).unwrap();
        assert_eq!(reloaded.rules.len(), 1);
        assert_eq!(
            serde_json::to_value(&reloaded.rules).unwrap(),
            serde_json::to_value(&file.rules).unwrap()
        );
    }

    #[test]
    fn test_default_output_path_and_probe_split() {
        assert_eq!(default_output_path("configs/webpack.rules.yaml", OutputFormat::Json), "webpack.rules_sfcroute.json");
        assert_eq!(split_probe("/src/App.vue?vue&lang=css"), ("/src/App.vue", "?vue&lang=css"));
        assert_eq!(split_probe("/src/main.js"), ("/src/main.js", ""));
    }
}
