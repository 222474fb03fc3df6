use anyhow::{bail, Context, Result};
use clap::builder::styling::{AnsiColor, Color, Style, Styles};
use clap::{Parser, Subcommand};
use songbook_catalog::assets::{AssetChange, AssetKind, Upload};
use songbook_catalog::config::{AppConfig, CliConfig, FileConfig};
use songbook_catalog::coordinator::{MutationReport, SaveRequest};
use songbook_catalog::reconcile::TabularFormat;
use songbook_catalog::{Record, RecordKey, RecordStore, SearchIndex, Services};
use std::path::{Path, PathBuf};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

fn get_styles() -> Styles {
    Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .literal(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

#[derive(Parser, Debug)]
#[command(
    name = "songbook",
    version = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH")),
    styles = get_styles()
)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the command line.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding records.db and search.db.
    #[clap(long, global = true, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Base directory of the audio and document assets. Defaults to the db dir.
    #[clap(long, global = true, value_parser = parse_path)]
    pub media_path: Option<PathBuf>,

    /// Directory where exports are written.
    #[clap(long, global = true, value_parser = parse_path)]
    pub export_dir: Option<PathBuf>,

    /// Export file format: xlsx or csv.
    #[clap(long, global = true)]
    pub export_format: Option<TabularFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconciles a spreadsheet (XLSX or CSV) against the catalog. Use "-" for stdin.
    Import { file: String },

    /// Writes every record to a new spreadsheet in the export directory.
    Export,

    /// Rebuilds the search index from the record store.
    Reindex,

    /// Searches the catalog. Without a term, lists every record by recency.
    Search { term: Option<String> },

    /// Prints one record as JSON.
    Get { author: String, title: String },

    /// Creates or updates a record from a JSON file.
    Save {
        record: PathBuf,

        /// Author the record was stored under before this save.
        #[clap(long)]
        old_author: Option<String>,

        /// Title the record was stored under before this save.
        #[clap(long)]
        old_title: Option<String>,

        /// New audio file for the record.
        #[clap(long, conflicts_with = "delete_audio")]
        audio: Option<PathBuf>,

        #[clap(long)]
        delete_audio: bool,

        /// New supplementary document for the record.
        #[clap(long, conflicts_with = "delete_document")]
        document: Option<PathBuf>,

        #[clap(long)]
        delete_document: bool,
    },

    /// Deletes a record together with its assets.
    Delete { author: String, title: String },

    /// Deletes every record and asset, then clears the search index.
    DeleteAll {
        /// Confirms the deletion.
        #[clap(long)]
        yes: bool,
    },
}

async fn asset_change(file: Option<&Path>, delete: bool) -> Result<AssetChange> {
    if delete {
        return Ok(AssetChange::Delete);
    }
    match file {
        Some(path) => {
            let upload = Upload::open(path)
                .await
                .with_context(|| format!("Failed to open {:?}", path))?;
            Ok(AssetChange::Replace(upload))
        }
        None => Ok(AssetChange::Keep),
    }
}

fn report_degradations<T>(report: &MutationReport<T>) {
    if !report.is_consistent() {
        warn!(
            "Mutation left {} degradation(s); run `songbook reindex` to repair the index",
            report.degradations.len()
        );
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(command: Command, services: &Services) -> Result<()> {
    match command {
        Command::Import { file } => {
            let stats = if file == "-" {
                services.reconciler.import_reader(tokio::io::stdin()).await?
            } else {
                services.reconciler.import_file(&parse_path(&file)?).await?
            };
            print_json(&stats)?;
        }
        Command::Export => {
            let exported = services.reconciler.export().await?;
            print_json(&exported)?;
        }
        Command::Reindex => {
            let count = services.coordinator.rebuild_index().await?;
            info!("Reindexed {} records", count);
        }
        Command::Search { term } => {
            let hits = services.index.query(term.as_deref().unwrap_or("")).await?;
            print_json(&hits)?;
        }
        Command::Get { author, title } => {
            let key = RecordKey::new(author, title).normalized();
            match services.store.get(&key).await? {
                Some(record) => print_json(&record)?,
                None => bail!("Record '{}' not found", key),
            }
        }
        Command::Save {
            record,
            old_author,
            old_title,
            audio,
            delete_audio,
            document,
            delete_document,
        } => {
            let content = tokio::fs::read_to_string(&record)
                .await
                .with_context(|| format!("Failed to read {:?}", record))?;
            let record: Record = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse record {:?}", record))?;

            let mut request = SaveRequest::new(record.clone())
                .with_asset(
                    AssetKind::Audio,
                    asset_change(audio.as_deref(), delete_audio).await?,
                )
                .with_asset(
                    AssetKind::Document,
                    asset_change(document.as_deref(), delete_document).await?,
                );
            if old_author.is_some() || old_title.is_some() {
                request = request.renaming(RecordKey::new(
                    old_author.unwrap_or(record.author),
                    old_title.unwrap_or(record.title),
                ));
            }

            let report = services.coordinator.save(request).await?;
            report_degradations(&report);
            print_json(&report.value)?;
        }
        Command::Delete { author, title } => {
            let key = RecordKey::new(author, title);
            let report = services.coordinator.delete(&key).await?;
            report_degradations(&report);
            if report.value {
                println!("Deleted '{}'", key.normalized());
            } else {
                println!("Record '{}' not found", key.normalized());
            }
        }
        Command::DeleteAll { yes } => {
            if !yes {
                bail!("Refusing to delete every record without --yes");
            }
            let report = services.coordinator.delete_all().await?;
            report_degradations(&report);
            println!("Deleted {} records", report.value);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        media_path: cli_args.media_path.clone(),
        export_dir: cli_args.export_dir.clone(),
        export_format: cli_args.export_format,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    let services = Services::open(&config).await?;
    run(cli_args.command, &services).await
}
