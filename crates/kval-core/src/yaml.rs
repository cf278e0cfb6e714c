//! # YAML Helpers
//!
//! Manifests, CRD files and patch files are YAML; every consumer works on
//! `serde_json::Value` trees. Parsing goes through `serde_yaml::Value` first
//! so that duplicate mapping keys are rejected rather than silently
//! overwritten.

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum YamlError {
    #[error("invalid YAML: {0}")]
    Syntax(#[from] serde_yaml::Error),

    #[error("YAML-to-JSON conversion failed: {0}")]
    Conversion(String),
}

/// Parse one YAML (or JSON) document into a JSON value tree.
pub fn parse_yaml(text: &str) -> Result<Value, YamlError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(text)?;
    yaml_to_json_value(&yaml).map_err(YamlError::Conversion)
}

/// Convert a `serde_yaml::Value` to a `serde_json::Value`.
///
/// Tags are dropped; non-string scalar keys are stringified.
pub fn yaml_to_json_value(yaml: &serde_yaml::Value) -> Result<Value, String> {
    match yaml {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Number(serde_json::Number::from(i)))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::Number(serde_json::Number::from(u)))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("cannot represent float {f} in JSON"))
            } else {
                Err(format!("unsupported YAML number: {n:?}"))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => {
            let items: Result<Vec<Value>, String> = seq.iter().map(yaml_to_json_value).collect();
            Ok(Value::Array(items?))
        }
        serde_yaml::Value::Mapping(map) => {
            let mut json_map = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => return Err(format!("unsupported YAML map key type: {other:?}")),
                };
                json_map.insert(key, yaml_to_json_value(v)?);
            }
            Ok(Value::Object(json_map))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json_value(&tagged.value),
    }
}

/// True for a `---` separator line, optionally followed by whitespace or a
/// comment.
fn is_separator(line: &str) -> bool {
    match line.strip_prefix("---") {
        Some(rest) => {
            let rest = rest.trim();
            rest.is_empty() || rest.starts_with('#')
        }
        None => false,
    }
}

/// Split a multi-document YAML stream on separator lines.
///
/// Blank sections between two separators are kept (callers record them as
/// skipped documents); a whitespace-only section before the first separator
/// or after the last one is dropped.
pub fn split_documents(text: &str) -> Vec<String> {
    let mut docs = Vec::new();
    let mut current = String::new();
    for line in text.split_inclusive('\n') {
        if is_separator(line.trim_end_matches(['\r', '\n'])) {
            docs.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
        }
    }
    docs.push(current);

    if docs.len() > 1 && docs.last().is_some_and(|d| d.trim().is_empty()) {
        docs.pop();
    }
    if docs.len() > 1 && docs.first().is_some_and(|d| d.trim().is_empty()) {
        docs.remove(0);
    }
    docs
}

/// A document with nothing but whitespace and comments.
pub fn is_empty_document(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_to_json_conversion() {
        let json_value = parse_yaml(
            r#"
name: web
replicas: 3
enabled: true
ratio: 0.5
items:
  - one
  - two
"#,
        )
        .unwrap();
        assert_eq!(json_value["name"], "web");
        assert_eq!(json_value["replicas"], 3);
        assert_eq!(json_value["enabled"], true);
        assert_eq!(json_value["ratio"], 0.5);
        assert_eq!(json_value["items"][1], "two");
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        assert!(matches!(
            parse_yaml("a: 1\na: 2\n"),
            Err(YamlError::Syntax(_))
        ));
    }

    #[test]
    fn numeric_keys_are_stringified() {
        let v = parse_yaml("1: one\ntrue: yes\n").unwrap();
        assert_eq!(v["1"], "one");
        assert_eq!(v["true"], "yes");
    }

    #[test]
    fn split_keeps_blank_middle_sections() {
        let docs = split_documents("a: 1\n---\n\n---\nb: 2\n");
        assert_eq!(docs.len(), 3);
        assert!(is_empty_document(&docs[1]));
        assert_eq!(docs[2], "b: 2\n");
    }

    #[test]
    fn split_drops_leading_and_trailing_blank_sections() {
        let docs = split_documents("---\na: 1\n---\nb: 2\n---\n");
        assert_eq!(docs, vec!["a: 1\n".to_string(), "b: 2\n".to_string()]);
    }

    #[test]
    fn separator_with_comment_splits() {
        let docs = split_documents("a: 1\n--- # next\nb: 2\n");
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn separator_must_start_the_line() {
        let docs = split_documents("a: |\n  ---\n  text\n");
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn comment_only_document_is_empty() {
        assert!(is_empty_document("# just a comment\n\n"));
        assert!(!is_empty_document("# c\nkind: Pod\n"));
    }
}
