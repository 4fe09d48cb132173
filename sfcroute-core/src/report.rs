use crate::rules::TransformSummary;
use crate::types::RawRule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version stamps written into reports
pub mod versions {
    pub const SFCROUTE_VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const REPORT_FORMAT_VERSION: &str = "1.0.0";
}

/// Record of one transformation pass, for build logs and diffing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformReport {
    pub plugin: String,
    pub extension: String,
    pub input_fingerprint: String,
    pub summary: TransformSummary,
    pub created_at: DateTime<Utc>,
    pub tool_version: String,
    pub report_version: String,
}

impl TransformReport {
    pub fn new(plugin: &str, extension: &str, input: &[RawRule], summary: TransformSummary) -> Self {
        Self {
            plugin: plugin.to_string(),
            extension: extension.to_string(),
            input_fingerprint: fingerprint(input),
            summary,
            created_at: Utc::now(),
            tool_version: versions::SFCROUTE_VERSION.to_string(),
            report_version: versions::REPORT_FORMAT_VERSION.to_string(),
        }
    }
}

/// SHA-256 over the JSON form of a rule list.
pub fn fingerprint(rules: &[RawRule]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    for rule in rules {
        // in-memory predicates serialize by name only
        let json = serde_json::to_string(rule).unwrap_or_default();
        hasher.update(json.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary() -> TransformSummary {
        TransformSummary {
            component_rule_index: 0,
            compiler_use_index: 0,
            input_rules: 1,
            cloned_rules: 0,
            output_rules: 2,
        }
    }

    #[test]
    fn test_fingerprint_is_stable_and_order_sensitive() {
        let rules: Vec<RawRule> = serde_json::from_value(json!([
            { "test": { "regex": "\\.vue$" }, "loader": "vue-loader" },
            { "test": { "regex": "\\.css$" }, "use": ["css-loader"] }
        ]))
        .unwrap();
        let reversed: Vec<RawRule> = rules.iter().rev().cloned().collect();

        assert_eq!(fingerprint(&rules), fingerprint(&rules));
        assert_ne!(fingerprint(&rules), fingerprint(&reversed));
        assert_eq!(fingerprint(&rules).len(), 64);
    }

    #[test]
    fn test_report_serializes() {
        let report = TransformReport::new("VueLoaderPlugin", "vue", &[], summary());
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["plugin"], json!("VueLoaderPlugin"));
        assert_eq!(value["summary"]["output_rules"], json!(2));
        assert_eq!(value["tool_version"], json!(versions::SFCROUTE_VERSION));
    }
}
