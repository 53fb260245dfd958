//! Printing of stored items.
//!
//! Supports shell assignments (optionally `export`ed) and a JSON object.

use std::io::Write;

use anyhow::Result;
use clap::ArgAction;
use tracing::debug;

use crate::models::StoredItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// `KEY='value'` lines
    #[default]
    Shell,
    /// A single `{"KEY": "value"}` object
    Json,
}

/// How `get` and `fetch` render what they read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::Args)]
pub struct OutputConfig {
    /// Prefix each assignment with `export`
    #[arg(long)]
    pub export: bool,

    /// Print stored values without deserializing them
    #[arg(long = "raw", action = ArgAction::SetFalse)]
    pub deserialize: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            export: false,
            deserialize: true,
            format: OutputFormat::Shell,
        }
    }
}

/// Quotes `value` for a POSIX shell single-quoted string.
pub fn escape(value: &str) -> String {
    value.replace('\'', r"'\''")
}

/// Formats one item as a shell assignment, without trailing newline.
pub fn shell_line(item: &StoredItem, export: bool) -> String {
    let prefix = if export { "export " } else { "" };
    format!("{prefix}{}='{}'", item.key, escape(&item.value))
}

/// Writes `items` to `out` in the configured format.
pub fn write_items<W: Write>(out: &mut W, items: &[StoredItem], config: &OutputConfig) -> Result<()> {
    debug!(count = items.len(), format = ?config.format, "Writing items");

    match config.format {
        OutputFormat::Shell => {
            for item in items {
                writeln!(out, "{}", shell_line(item, config.export))?;
            }
        }
        OutputFormat::Json => {
            let object: serde_json::Map<String, serde_json::Value> = items
                .iter()
                .map(|item| (item.key.clone(), serde_json::Value::String(item.value.clone())))
                .collect();
            serde_json::to_writer_pretty(&mut *out, &object)?;
            writeln!(out)?;
        }
    }

    out.flush()?;
    Ok(())
}
