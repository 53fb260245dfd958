//! The operations behind each CLI subcommand.
//!
//! Every function takes its store and encryptor as parameters and writes to
//! the given output, so the binary wires in DynamoDB and KMS while tests use
//! [`MemoryStore`](crate::store::MemoryStore) and a stub encryptor.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::codec;
use crate::crypto::Encryptor;
use crate::models::{StagedItem, StagedValue};
use crate::output::{self, OutputConfig};
use crate::parser;
use crate::store::{KeyValueStore, Table};
use crate::template::{self, OutputTarget};

/// Stores every entry of the config document at `config_file`, creating the
/// table first if needed. Returns the number of items written.
#[tracing::instrument(skip(store, encryptor, config_file), fields(config_file = %config_file.display()))]
pub async fn store<S, E>(
    store: &S,
    encryptor: &E,
    table_name: &str,
    config_file: &Path,
) -> Result<usize>
where
    S: KeyValueStore + ?Sized,
    E: Encryptor + ?Sized,
{
    let staged = parser::parse_file(config_file)?;
    let items = codec::serialize_items(encryptor, &staged).await?;

    let table = Table::new(store, table_name);
    table.ensure_table().await?;
    table.write_all(&items).await?;

    info!(count = items.len(), "Items stored");
    Ok(items.len())
}

/// Serializes and stores a single value.
#[tracing::instrument(skip(store, encryptor, value), fields(serialization = %value.serialization.kind))]
pub async fn set<S, E>(
    store: &S,
    encryptor: &E,
    table_name: &str,
    key: &str,
    value: StagedValue,
) -> Result<()>
where
    S: KeyValueStore + ?Sized,
    E: Encryptor + ?Sized,
{
    let staged = [StagedItem {
        key: key.to_string(),
        value,
    }];
    let items = codec::serialize_items(encryptor, &staged).await?;

    let table = Table::new(store, table_name);
    table.ensure_table().await?;
    table.write_all(&items).await?;

    info!("Item stored");
    Ok(())
}

/// Prints the value of `key`.
#[tracing::instrument(skip(store, encryptor, config, out))]
pub async fn get<S, E, W>(
    store: &S,
    encryptor: &E,
    table_name: &str,
    key: &str,
    config: &OutputConfig,
    out: &mut W,
) -> Result<()>
where
    S: KeyValueStore + ?Sized,
    E: Encryptor + ?Sized,
    W: Write,
{
    let table = Table::new(store, table_name);
    let item = table.get_by_key(key).await?;
    let items = codec::deserialize_items(encryptor, vec![item], config.deserialize).await?;
    output::write_items(out, &items, config)
}

/// Prints every item of the table.
#[tracing::instrument(skip(store, encryptor, config, out))]
pub async fn fetch<S, E, W>(
    store: &S,
    encryptor: &E,
    table_name: &str,
    config: &OutputConfig,
    out: &mut W,
) -> Result<()>
where
    S: KeyValueStore + ?Sized,
    E: Encryptor + ?Sized,
    W: Write,
{
    let table = Table::new(store, table_name);
    let items = table.read_all().await?;
    let items = codec::deserialize_items(encryptor, items, config.deserialize).await?;
    output::write_items(out, &items, config)
}

/// Renders the template at `template_file` into `target`, using `stdout`
/// for [`OutputTarget::Stdout`]. Nothing is written unless every
/// placeholder resolves.
#[tracing::instrument(skip(store, encryptor, template_file, stdout), fields(template_file = %template_file.display()))]
pub async fn template<S, E, W>(
    store: &S,
    encryptor: &E,
    table_name: &str,
    template_file: &Path,
    target: &OutputTarget,
    stdout: &mut W,
) -> Result<()>
where
    S: KeyValueStore + ?Sized,
    E: Encryptor + ?Sized,
    W: Write,
{
    let input = std::fs::read(template_file)
        .with_context(|| format!("failed to read template '{}'", template_file.display()))?;

    let table = Table::new(store, table_name);
    let rendered = template::render(&table, encryptor, &input).await?;

    match target {
        OutputTarget::Stdout => {
            stdout.write_all(&rendered)?;
            stdout.flush()?;
        }
        OutputTarget::File(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            info!(path = %path.display(), "Template written");
        }
    }
    Ok(())
}
