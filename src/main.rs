//! CLI entry point for dynamokv.
//!
//! Stores key/value configuration in a DynamoDB table, prints it back as
//! shell assignments or JSON, and fills `{{KEY}}` placeholders in templates.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dynamokv::commands;
use dynamokv::models::{Serialization, StagedValue};
use dynamokv::output::OutputConfig;
use dynamokv::session::AwsSettings;
use dynamokv::template::OutputTarget;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "dynamokv")]
#[command(about = "Key/value configuration and secrets in DynamoDB", long_about = None)]
struct Cli {
    #[command(flatten)]
    aws: AwsSettings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store every entry of a YAML config file
    Store {
        #[arg(value_name = "TABLENAME")]
        table: String,

        #[arg(value_name = "CONFIG_FILE")]
        config_file: PathBuf,
    },
    /// Set the value of a single key
    Set {
        #[arg(value_name = "TABLENAME")]
        table: String,

        key: String,

        value: String,

        /// Serialization as type::option:value,... (e.g. kms::key:alias/app)
        #[arg(long, default_value = "plain")]
        serialization: Serialization,
    },
    /// Print the value of a key
    Get {
        #[arg(value_name = "TABLENAME")]
        table: String,

        key: String,

        #[command(flatten)]
        output: OutputConfig,
    },
    /// Print every key/value pair of a table
    Fetch {
        #[arg(value_name = "TABLENAME")]
        table: String,

        #[command(flatten)]
        output: OutputConfig,
    },
    /// Replace {{Key}} and {{RAW:Key}} placeholders with stored values
    ///
    /// {{Key}} is replaced by the deserialized value of Key, {{RAW:Key}} by
    /// its stored representation. Without OUTPUTFILE or --inplace the result
    /// goes to standard output.
    Template {
        #[arg(value_name = "TABLENAME")]
        table: String,

        #[arg(value_name = "TEMPLATEFILE")]
        template: PathBuf,

        #[arg(value_name = "OUTPUTFILE")]
        output: Option<PathBuf>,

        /// Replace the template file with the result
        #[arg(short, long, conflicts_with = "output")]
        inplace: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // stderr only: stdout carries command output. The JSON file layer is
    // enabled by LOG_FILE_PATH.
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let (json_layer, _file_guard) = match std::env::var("LOG_FILE_PATH") {
        Ok(log_file_path) => {
            let path = PathBuf::from(log_file_path);
            let log_dir = path.parent().map(PathBuf::from).unwrap_or_else(|| "logs".into());
            let log_file_name = path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| "dynamokv.log".into());

            let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(non_blocking_file)
                .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let (store, encryptor) = cli.aws.connect().await;
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Store { table, config_file } => {
            let count = commands::store(&store, &encryptor, &table, &config_file).await?;
            info!(table = %table, count, "Config stored");
        }
        Commands::Set {
            table,
            key,
            value,
            serialization,
        } => {
            let value = StagedValue {
                value,
                serialization,
            };
            commands::set(&store, &encryptor, &table, &key, value).await?;
        }
        Commands::Get { table, key, output } => {
            commands::get(&store, &encryptor, &table, &key, &output, &mut stdout).await?;
        }
        Commands::Fetch { table, output } => {
            commands::fetch(&store, &encryptor, &table, &output, &mut stdout).await?;
        }
        Commands::Template {
            table,
            template,
            output,
            inplace,
        } => {
            let target = match (output, inplace) {
                (Some(path), _) => OutputTarget::File(path),
                (None, true) => OutputTarget::File(template.clone()),
                (None, false) => OutputTarget::Stdout,
            };
            commands::template(&store, &encryptor, &table, &template, &target, &mut stdout)
                .await?;
        }
    }

    stdout.flush()?;
    Ok(())
}
