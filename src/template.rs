//! Placeholder substitution.
//!
//! A template is any document containing placeholders of the form
//! `{{KEY}}` (replaced by the decoded value of `KEY`) or `{{RAW:KEY}}`
//! (replaced by the stored representation). There is no escape for
//! literal braces.

use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::Result;
use regex::bytes::Regex;
use tracing::{debug, warn};

use crate::codec;
use crate::crypto::Encryptor;
use crate::error::{KvError, PlaceholderFailure};
use crate::store::{KeyValueStore, Table};

/// Modifier that skips deserialization. Other modifiers are accepted and
/// ignored.
pub const RAW_MODIFIER: &str = "RAW";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{(?:(\w+?):)?(.+?)\}\}").expect("placeholder pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(Vec<u8>),
    Placeholder {
        modifier: Option<String>,
        key: String,
    },
}

/// Where a rendered template goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Written as rendered, with no trailing newline added.
    Stdout,
    File(PathBuf),
}

/// Splits `input` into literal runs and placeholders. Joining the tokens
/// back together reproduces `input` exactly.
pub fn tokenize(input: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(input) {
        let whole = caps.get(0).expect("group 0 is always present");
        if whole.start() > last {
            tokens.push(Token::Literal(input[last..whole.start()].to_vec()));
        }

        let modifier = caps
            .get(1)
            .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned());
        let key = String::from_utf8_lossy(&caps[2]).into_owned();
        tokens.push(Token::Placeholder { modifier, key });

        last = whole.end();
    }

    if last < input.len() {
        tokens.push(Token::Literal(input[last..].to_vec()));
    }
    tokens
}

/// Resolves every placeholder of `input` against `table`.
///
/// All placeholders are looked up, one query per occurrence, before the
/// outcome is decided: if any of them fails the result is a single
/// [`KvError::TemplateResolution`] listing every failure, and no partial
/// output is returned.
pub async fn render<S, E>(table: &Table<'_, S>, encryptor: &E, input: &[u8]) -> Result<Vec<u8>>
where
    S: KeyValueStore + ?Sized,
    E: Encryptor + ?Sized,
{
    let mut output = Vec::with_capacity(input.len());
    let mut failures = Vec::new();

    for token in tokenize(input) {
        match token {
            Token::Literal(bytes) => output.extend_from_slice(&bytes),
            Token::Placeholder { modifier, key } => {
                match resolve(table, encryptor, modifier.as_deref(), &key).await {
                    Ok(value) => output.extend_from_slice(value.as_bytes()),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Placeholder could not be resolved");
                        failures.push(PlaceholderFailure {
                            key,
                            reason: format!("{e:#}"),
                        });
                    }
                }
            }
        }
    }

    if !failures.is_empty() {
        return Err(KvError::TemplateResolution(failures).into());
    }
    Ok(output)
}

async fn resolve<S, E>(
    table: &Table<'_, S>,
    encryptor: &E,
    modifier: Option<&str>,
    key: &str,
) -> Result<String>
where
    S: KeyValueStore + ?Sized,
    E: Encryptor + ?Sized,
{
    // Any modifier other than RAW still decodes.
    let apply = modifier != Some(RAW_MODIFIER);

    let item = table.get_by_key(key).await?;
    debug!(key, apply, "Placeholder resolved");
    codec::deserialize(encryptor, &item, apply).await
}
