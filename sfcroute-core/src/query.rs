use crate::error::NormalizeError;
use crate::types::Options;
use serde_json::Value;

/// Key/value view of a virtual block request's query (`?vue&type=style&lang=css`).
///
/// Built on demand inside a cloned rule's query test and thrown away after.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntheticResourceQuery {
    pairs: Vec<(String, String)>,
}

impl SyntheticResourceQuery {
    /// Parses a raw query; a leading `?` is ignored. Keys without `=` map to "".
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs = form_urlencoded::parse(query.as_bytes())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        Self { pairs }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Splits a loader request `css-loader?modules` into loader and query.
pub fn split_loader_request(request: &str) -> (&str, Option<&str>) {
    match request.split_once('?') {
        Some((loader, query)) => (loader, Some(query)),
        None => (request, None),
    }
}

/// Turns an inline loader query into an options object.
///
/// `{...}` is read as JSON. Otherwise the query is a `&`/`,` separated list:
/// `key=value` sets a string (`true`, `false` and `null` become the JSON
/// values), `key[]=value` appends to a list, `+key` / `key` set `true`,
/// `-key` sets `false`.
pub fn parse_loader_query(query: &str) -> Result<Options, NormalizeError> {
    let query = query.strip_prefix('?').unwrap_or(query).trim();
    if query.is_empty() {
        return Ok(Options::new());
    }

    if query.starts_with('{') {
        return match serde_json::from_str::<Value>(query) {
            Ok(Value::Object(options)) => Ok(options),
            Ok(_) => Err(invalid_query(query, "expected a JSON object")),
            Err(err) => Err(invalid_query(query, &err.to_string())),
        };
    }

    let mut options = Options::new();
    for part in query.split(['&', ',']).filter(|part| !part.is_empty()) {
        let (key, value) = match part.split_once('=') {
            Some((key, value)) => (decode(key), query_value(decode(value))),
            None => match part.as_bytes()[0] {
                b'-' => (decode(&part[1..]), Value::Bool(false)),
                b'+' => (decode(&part[1..]), Value::Bool(true)),
                _ => (decode(part), Value::Bool(true)),
            },
        };

        if let Some(key) = key.strip_suffix("[]") {
            let entry = options
                .entry(key.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            match entry {
                Value::Array(items) => items.push(value),
                _ => return Err(invalid_query(query, "mixed scalar and list values")),
            }
        } else {
            options.insert(key, value);
        }
    }
    Ok(options)
}

fn query_value(value: String) -> Value {
    match value.as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => Value::String(value),
    }
}

fn decode(raw: &str) -> String {
    // form_urlencoded yields nothing for an empty input
    form_urlencoded::parse(format!("k={raw}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

fn invalid_query(query: &str, reason: &str) -> NormalizeError {
    NormalizeError::InvalidLoaderQuery {
        query: query.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_synthetic_query_parsing() {
        let parsed = SyntheticResourceQuery::parse("?vue&type=style&index=0&lang=scss");
        assert_eq!(parsed.get("lang"), Some("scss"));
        assert_eq!(parsed.get("type"), Some("style"));
        assert_eq!(parsed.get("vue"), Some(""));
        assert_eq!(parsed.get("module"), None);
        assert_eq!(parsed.len(), 4);
    }

    #[test]
    fn test_synthetic_query_first_value_wins() {
        let parsed = SyntheticResourceQuery::parse("lang=ts&lang=js");
        assert_eq!(parsed.get("lang"), Some("ts"));
    }

    #[test]
    fn test_synthetic_query_decodes_values() {
        let parsed = SyntheticResourceQuery::parse("?src=a%20b.css&lang=c%2Bc");
        assert_eq!(parsed.get("src"), Some("a b.css"));
        assert_eq!(parsed.get("lang"), Some("c+c"));
        assert!(SyntheticResourceQuery::parse("").is_empty());
    }

    #[test]
    fn test_split_loader_request() {
        assert_eq!(split_loader_request("css-loader?modules"), ("css-loader", Some("modules")));
        assert_eq!(split_loader_request("style-loader"), ("style-loader", None));
    }

    #[test]
    fn test_parse_loader_query_flags_and_values() {
        let options = parse_loader_query("?modules&-url&+sourceMap&name=[hash].css").unwrap();
        assert_eq!(
            Value::Object(options),
            json!({ "modules": true, "url": false, "sourceMap": true, "name": "[hash].css" })
        );
    }

    #[test]
    fn test_parse_loader_query_special_values() {
        let options = parse_loader_query("hotReload=false&x=null&y=true&limit=1024&name=nullable").unwrap();
        assert_eq!(
            Value::Object(options),
            json!({ "hotReload": false, "x": null, "y": true, "limit": "1024", "name": "nullable" })
        );
    }

    #[test]
    fn test_parse_loader_query_lists_and_json() {
        let options = parse_loader_query("presets[]=env,presets[]=react").unwrap();
        assert_eq!(Value::Object(options), json!({ "presets": ["env", "react"] }));

        let options = parse_loader_query(r#"{"compact":false}"#).unwrap();
        assert_eq!(Value::Object(options), json!({ "compact": false }));

        assert!(matches!(
            parse_loader_query("{not json"),
            Err(NormalizeError::InvalidLoaderQuery { .. })
        ));
    }
}
