//! YAML config document reader.
//!
//! ```yaml
//! YOUR_KEY: plain value
//! ENCODED_KEY:
//!   serialization: base64
//!   value: |
//!     some long string
//!     spanning lines
//! ENCRYPTED_KEY:
//!   serialization:
//!     type: kms
//!     key: alias/app
//!   value: secret
//! LEGACY_ENCRYPTED_KEY:
//!   serialization:
//!     kms:
//!       key: alias/app
//!   value: secret
//! FROM_FILE:
//!   value:
//!     file: path/to/file
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde_yaml::{Mapping, Value};

use crate::models::{Serialization, StagedItem, StagedValue};

/// Reads and parses the config document at `path`.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Vec<StagedItem>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    parse_str(&content).with_context(|| format!("invalid config file '{}'", path.display()))
}

/// Parses a config document. Items come back in document order.
pub fn parse_str(content: &str) -> Result<Vec<StagedItem>> {
    let document: Value = serde_yaml::from_str(content)?;
    let mapping = match document {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Ok(Vec::new()),
        _ => bail!("document must be a mapping of keys to values"),
    };

    mapping
        .into_iter()
        .map(|(key, value)| -> Result<StagedItem> {
            let key = scalar(&key).ok_or_else(|| anyhow!("keys must be scalars, got {key:?}"))?;
            let value = parse_entry(value).with_context(|| format!("invalid entry '{key}'"))?;
            Ok(StagedItem { key, value })
        })
        .collect()
}

fn parse_entry(value: Value) -> Result<StagedValue> {
    if let Some(plain) = scalar(&value) {
        return Ok(StagedValue::plain(plain));
    }

    let Value::Mapping(mut entry) = value else {
        bail!("expected a scalar or a mapping with 'value'");
    };

    let raw_value = entry
        .remove("value")
        .ok_or_else(|| anyhow!("missing 'value'"))?;
    let serialization = match entry.remove("serialization") {
        Some(raw) => parse_serialization(raw)?,
        None => Serialization::default(),
    };

    Ok(StagedValue {
        value: parse_value(raw_value)?,
        serialization,
    })
}

fn parse_value(value: Value) -> Result<String> {
    if let Some(s) = scalar(&value) {
        return Ok(s);
    }

    let file = value
        .get("file")
        .and_then(scalar)
        .ok_or_else(|| anyhow!("'value' must be a string or {{file: path}}"))?;
    let content = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read value file '{file}'"))?;
    Ok(content.trim_end_matches('\n').to_string())
}

fn parse_serialization(value: Value) -> Result<Serialization> {
    if let Value::String(name) = &value {
        return Ok(Serialization::new(name.parse()?));
    }

    let Value::Mapping(mapping) = value else {
        bail!("'serialization' must be a type name or a mapping");
    };

    match mapping.get("type") {
        Some(kind) => {
            let kind = scalar(kind).ok_or_else(|| anyhow!("'type' must be a string"))?;
            let mut serialization = Serialization::new(kind.parse()?);
            serialization.options = options(&mapping, Some("type"))?;
            Ok(serialization)
        }
        // `{kms: {key: ...}}`
        None if mapping.len() == 1 => {
            let Some((kind, opts)) = mapping.iter().next() else {
                bail!("'serialization' mapping is empty");
            };
            let kind = scalar(kind).ok_or_else(|| anyhow!("serialization type must be a string"))?;
            let mut serialization = Serialization::new(kind.parse()?);
            serialization.options = match opts {
                Value::Mapping(opts) => options(opts, None)?,
                Value::Null => BTreeMap::new(),
                _ => bail!("options of '{kind}' must be a mapping"),
            };
            Ok(serialization)
        }
        None => bail!("'serialization' mapping needs a 'type'"),
    }
}

fn options(mapping: &Mapping, skip: Option<&str>) -> Result<BTreeMap<String, String>> {
    let mut options = BTreeMap::new();
    for (name, value) in mapping {
        let name = scalar(name).ok_or_else(|| anyhow!("option names must be strings"))?;
        if skip == Some(name.as_str()) {
            continue;
        }
        let value = scalar(value).ok_or_else(|| anyhow!("option '{name}' must be a scalar"))?;
        options.insert(name, value);
    }
    Ok(options)
}

/// Strings, numbers and booleans become strings; anything else is `None`.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SerializationType;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    #[test]
    fn test_plain_and_base64_entries() {
        let items = parse_str("A: hello\nB:\n  serialization: base64\n  value: hello\n").unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].key, "A");
        assert_eq!(items[0].value, StagedValue::plain("hello"));
        assert_eq!(items[1].key, "B");
        assert_eq!(items[1].value.value, "hello");
        assert_eq!(items[1].value.serialization.kind, SerializationType::Base64);
    }

    #[test]
    fn test_json_document_is_accepted() {
        let items =
            parse_str(r#"{"A": "hello", "B": {"serialization": "base64", "value": "hello"}}"#)
                .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].value.serialization.kind, SerializationType::Base64);
    }

    #[test]
    fn test_kms_with_type_and_options() {
        let doc = "S:\n  serialization:\n    type: kms\n    key: alias/app\n  value: secret\n";
        let items = parse_str(doc).unwrap();

        let serialization = &items[0].value.serialization;
        assert_eq!(serialization.kind, SerializationType::Kms);
        assert_eq!(serialization.option("key"), Some("alias/app"));
        assert_eq!(serialization.option("type"), None);
    }

    #[test]
    fn test_kms_nested_form() {
        let doc = "S:\n  serialization:\n    kms:\n      key: alias/app\n  value: secret\n";
        let items = parse_str(doc).unwrap();

        assert_eq!(items[0].value.serialization, Serialization::kms("alias/app"));
    }

    #[test]
    fn test_scalars_are_stringified() {
        let items = parse_str("PORT: 8080\nDEBUG: true\n").unwrap();
        assert_eq!(items[0].value.value, "8080");
        assert_eq!(items[1].value.value, "true");
    }

    #[test]
    fn test_unknown_serialization_is_rejected() {
        let err = parse_str("A:\n  serialization: rot13\n  value: x\n").unwrap_err();
        assert!(format!("{err:#}").contains("unknown serialization type 'rot13'"));
    }

    #[test]
    fn test_missing_value_is_rejected() {
        let err = parse_str("A:\n  serialization: base64\n").unwrap_err();
        assert!(format!("{err:#}").contains("missing 'value'"));
    }

    #[test]
    fn test_empty_document() {
        assert!(parse_str("").unwrap().is_empty());
    }

    #[test]
    fn test_value_from_file_trims_trailing_newlines() {
        let path = temp_path("dynamokv_parser_value.txt");
        fs::write(&path, "line one\nline two\n\n").unwrap();

        let doc = format!("CERT:\n  value:\n    file: '{path}'\n");
        let items = parse_str(&doc).unwrap();
        assert_eq!(items[0].value.value, "line one\nline two");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_parse_file_reports_missing_file() {
        let err = parse_file(temp_path("dynamokv_parser_absent.yml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
