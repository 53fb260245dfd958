//! Domain error kinds.
//!
//! Functions in this crate return [`anyhow::Result`]; the kinds below are
//! raised inside those results and can be recovered with
//! `err.downcast_ref::<KvError>()`.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("unknown serialization type '{0}'")]
    UnknownSerialization(String),

    #[error("kms serialization requires a 'key' option")]
    MissingKeyOption,

    #[error("invalid serialization flag '{0}', expected type::option:value,option2:value2")]
    InvalidSerializationFlag(String),

    #[error("failed to decode value of '{key}': {reason}")]
    Decode { key: String, reason: String },

    #[error("failed to decrypt value of '{key}': {reason}")]
    Decrypt { key: String, reason: String },

    #[error("no item found with key '{0}'")]
    NotFound(String),

    #[error("{count} items found with key '{key}'")]
    AmbiguousKey { key: String, count: usize },

    #[error("batch write to '{table}' left {count} items unprocessed")]
    UnprocessedItems { table: String, count: usize },

    #[error("template has {} unresolved placeholder(s): {}", .0.len(), summarize(.0))]
    TemplateResolution(Vec<PlaceholderFailure>),
}

/// A placeholder that could not be substituted, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderFailure {
    pub key: String,
    pub reason: String,
}

fn summarize(failures: &[PlaceholderFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl fmt::Display for PlaceholderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{{{}}}}}: {}", self.key, self.reason)
    }
}
