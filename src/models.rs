//! Values as they move between the config document, the codec and the table.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::KvError;

/// How a value is turned into its stored representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializationType {
    #[default]
    Plain,
    Base64,
    Kms,
}

impl SerializationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SerializationType::Plain => "plain",
            SerializationType::Base64 => "base64",
            SerializationType::Kms => "kms",
        }
    }
}

impl fmt::Display for SerializationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SerializationType {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(SerializationType::Plain),
            "base64" => Ok(SerializationType::Base64),
            "kms" => Ok(SerializationType::Kms),
            other => Err(KvError::UnknownSerialization(other.to_string())),
        }
    }
}

/// A serialization type together with its options (e.g. the KMS `key`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Serialization {
    pub kind: SerializationType,
    pub options: BTreeMap<String, String>,
}

impl Serialization {
    pub fn new(kind: SerializationType) -> Self {
        Self {
            kind,
            options: BTreeMap::new(),
        }
    }

    /// Builds a `kms` serialization bound to `key_id`.
    pub fn kms(key_id: impl Into<String>) -> Self {
        let mut s = Self::new(SerializationType::Kms);
        s.options.insert("key".to_string(), key_id.into());
        s
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }
}

/// Parses the command-line form `type::option:value,option2:value2`.
///
/// Only the first `:` of each option separates name from value, so KMS key
/// ARNs can be passed verbatim: `kms::key:arn:aws:kms:eu-west-1:123:key/abc`.
impl FromStr for Serialization {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, options) = match s.split_once("::") {
            Some((kind, options)) => (kind, Some(options)),
            None => (s, None),
        };

        let mut serialization = Serialization::new(kind.parse()?);

        if let Some(options) = options {
            for option in options.split(',') {
                let (name, value) = option
                    .split_once(':')
                    .filter(|(name, _)| !name.is_empty())
                    .ok_or_else(|| KvError::InvalidSerializationFlag(s.to_string()))?;
                serialization
                    .options
                    .insert(name.to_string(), value.to_string());
            }
        }

        Ok(serialization)
    }
}

/// A value waiting to be serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedValue {
    pub value: String,
    pub serialization: Serialization,
}

impl StagedValue {
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            serialization: Serialization::default(),
        }
    }
}

/// A key/value pair read from a config document or given to `set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedItem {
    pub key: String,
    pub value: StagedValue,
}

/// A row of the table: `value` is the stored representation and
/// `serialization` names the type needed to decode it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoredItem {
    pub key: String,
    pub value: String,
    pub serialization: String,
}

impl StoredItem {
    pub fn new(key: impl Into<String>, value: impl Into<String>, kind: SerializationType) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            serialization: kind.as_str().to_string(),
        }
    }
}
