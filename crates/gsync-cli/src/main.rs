use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

mod commands;
mod layer_file;

use commands::sync::SyncInputs;

#[derive(Parser)]
#[command(name = "gsync-cli")]
#[command(about = "Merge field-collected layer updates into a main layer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pre-merge checks (structure, key uniqueness, date field) only
    Check {
        #[command(flatten)]
        sync: SyncArgs,
    },

    /// Check, merge the source into the target, save the target and print the report
    Merge {
        #[command(flatten)]
        sync: SyncArgs,

        /// Write the merged target here instead of overwriting --target
        #[arg(long)]
        out: Option<PathBuf>,

        /// Merge in memory and print the report without saving
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// List key and date field candidates of a layer
    Fields {
        #[arg(long)]
        layer: PathBuf,

        /// Key field to list first when eligible (default: configured key)
        #[arg(long)]
        preferred: Option<String>,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Print JSON instead of key=value lines
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> user...)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Args)]
struct SyncArgs {
    /// Field-collected layer (.json or .csv)
    #[arg(long)]
    source: PathBuf,

    /// Main layer to update (.json or .csv)
    #[arg(long)]
    target: PathBuf,

    /// Unique identifier field (default: /sync/key_field)
    #[arg(long)]
    key: Option<String>,

    /// Last-modification date field (default: /sync/date_field)
    #[arg(long)]
    date_field: Option<String>,

    /// Only update records whose source date is strictly newer
    #[arg(long, default_value_t = false)]
    gate_by_date: bool,

    /// Extra field to neither compare nor write (repeatable)
    #[arg(long = "ignore")]
    ignore: Vec<String>,

    /// Row filter for the target, replacing the one stored in its document
    #[arg(long)]
    filter: Option<String>,

    /// Layered config paths in merge order
    #[arg(long = "config")]
    config_paths: Vec<String>,

    /// Print JSON instead of text
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl From<SyncArgs> for SyncInputs {
    fn from(a: SyncArgs) -> Self {
        SyncInputs {
            source: a.source,
            target: a.target,
            key: a.key,
            date_field: a.date_field,
            gate_by_date: a.gate_by_date,
            ignore: a.ignore,
            filter: a.filter,
            config_paths: a.config_paths,
            json: a.json,
        }
    }
}

fn main() -> Result<()> {
    // Load .env.local if present (dev convenience, e.g. RUST_LOG).
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Check { sync } => commands::sync::check(&sync.into())?,

        Commands::Merge { sync, out, dry_run } => {
            commands::sync::merge(&sync.into(), out.as_deref(), dry_run)?
        }

        Commands::Fields {
            layer,
            preferred,
            config_paths,
            json,
        } => commands::fields::fields(&layer, preferred.as_deref(), &config_paths, json)?,

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = gsync_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays parseable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
