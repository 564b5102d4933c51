//! roastlog - roast session capture and feature completion
//!
//! **Usage:**
//! ```bash
//! roastlog predict --model core --input session.json [--inventory 3] [--json] [--plain]
//! roastlog save --input session.json [--inventory 3]
//! roastlog list
//! roastlog inventory add --input lot.json
//! roastlog inventory list
//! roastlog inventory remove --id 3
//! roastlog init-config [--force]
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use roastlog_common::config::{
    default_config_path, write_toml_config, RootFolderInitializer, RootFolderResolver, TomlConfig,
};
use roastlog_common::db::{init_database, InventoryStore, SessionStore};
use roastlog_common::record::FlatRecord;
use roastlog_common::schema::ModelKind;
use roastlog_common::session::{BeanMetadata, RoastSession};
use roastlog_ml::flatten::{apply_defaults, normalize_time_entries};
use roastlog_ml::inference::{CompletionEngine, CoreEngine, ScoutEngine};
use roastlog_ml::report::{render_report, CompletionOutput, ReportStyle};
use roastlog_ml::{complete, Flattener};
use serde_json::Value;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Roast session capture and feature completion
#[derive(Parser, Debug)]
#[clap(name = "roastlog")]
#[clap(about = "Fill in unrecorded roast session fields from trained models")]
struct Cli {
    /// Root folder (database and model artifacts)
    #[clap(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Config file (default: ~/.config/roastlog/config.toml)
    #[clap(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict the blank fields of a session
    Predict {
        #[clap(long, value_enum, default_value = "core")]
        model: ModelArg,

        /// Session JSON, flat or nested (with `stages`)
        #[clap(long, value_name = "FILE")]
        input: PathBuf,

        /// Pre-fill bean metadata from this inventory lot
        #[clap(long, value_name = "ID")]
        inventory: Option<i64>,

        /// Print JSON instead of a text report
        #[clap(long)]
        json: bool,

        /// Mark predicted values with `*` instead of color
        #[clap(long)]
        plain: bool,
    },

    /// Append a nested session (10 stages) to the log
    Save {
        #[clap(long, value_name = "FILE")]
        input: PathBuf,

        #[clap(long, value_name = "ID")]
        inventory: Option<i64>,
    },

    /// List logged sessions
    List,

    /// Green coffee inventory
    Inventory {
        #[clap(subcommand)]
        action: InventoryCommand,
    },

    /// Write a starter config file (to --config, or the platform location)
    InitConfig {
        /// Replace an existing file
        #[clap(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum InventoryCommand {
    /// Add a lot from a bean metadata JSON file
    Add {
        #[clap(long, value_name = "FILE")]
        input: PathBuf,
    },
    /// List lots
    List,
    /// Remove a lot
    Remove {
        #[clap(long, value_name = "ID")]
        id: i64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModelArg {
    Core,
    Scout,
}

impl From<ModelArg> for ModelKind {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Core => ModelKind::Core,
            ModelArg::Scout => ModelKind::Scout,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = TomlConfig::locate(cli.config.as_deref());
    let loaded = config_path.as_deref().map(TomlConfig::from_file);
    let log_level = match &loaded {
        Some(Ok(config)) => config.logging.level.clone(),
        _ => "info".to_string(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    let config = match loaded {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            warn!("{}; using defaults", e);
            TomlConfig::default()
        }
        None => TomlConfig::default(),
    };

    let root = RootFolderResolver::new()
        .with_cli_arg(cli.root.clone())
        .with_config(&config)
        .resolve();
    let layout = RootFolderInitializer::new(root).with_models(config.models.clone());
    layout.ensure_directory_exists()?;
    info!(root = %layout.root().display(), "Root folder");

    match cli.command {
        Command::Predict {
            model,
            input,
            inventory,
            json,
            plain,
        } => {
            let style = ReportStyle::from_color(config.report.color && !plain);
            predict(&layout, model.into(), &input, inventory, json, style).await
        }
        Command::Save { input, inventory } => save(&layout, &input, inventory).await,
        Command::List => list(&layout).await,
        Command::Inventory { action } => match action {
            InventoryCommand::Add { input } => inventory_add(&layout, &input).await,
            InventoryCommand::List => inventory_list(&layout).await,
            InventoryCommand::Remove { id } => inventory_remove(&layout, id).await,
        },
        Command::InitConfig { force } => init_config(cli.config.as_deref(), layout.root(), force),
    }
}

async fn open_database(layout: &RootFolderInitializer) -> Result<SqlitePool> {
    let path = layout.database_path();
    init_database(&path)
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Bean metadata of an inventory lot as flat fields
async fn inventory_defaults(layout: &RootFolderInitializer, id: i64) -> Result<FlatRecord> {
    let pool = open_database(layout).await?;
    let entry = InventoryStore::new(pool).get(id).await?;
    println!("Using inventory lot {}", entry.summary());
    Ok(entry.to_bean_metadata().to_record())
}

async fn predict(
    layout: &RootFolderInitializer,
    kind: ModelKind,
    input_path: &Path,
    inventory: Option<i64>,
    json: bool,
    style: ReportStyle,
) -> Result<()> {
    let mut input = read_json(input_path)?;
    if let Some(id) = inventory {
        apply_defaults(&mut input, &inventory_defaults(layout, id).await?)?;
    }

    let record = Flattener::new(kind).from_json(&input)?;
    let engine: Box<dyn CompletionEngine> = match kind {
        ModelKind::Core => Box::new(CoreEngine::new(layout.core_meta_path())),
        ModelKind::Scout => Box::new(ScoutEngine::new(layout.scout_model_path())),
    };

    let predicted = complete(engine.as_ref(), record)
        .with_context(|| format!("{} inference failed", kind))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&CompletionOutput::new(&predicted))?);
    } else {
        println!("{}", render_report(&predicted, style));
    }
    Ok(())
}

async fn save(layout: &RootFolderInitializer, input_path: &Path, inventory: Option<i64>) -> Result<()> {
    let mut input = read_json(input_path)?;
    if input.get("stages").is_none() {
        bail!("A saved session needs a `stages` list with all 10 stages");
    }
    normalize_time_entries(&mut input)?;
    if let Some(id) = inventory {
        apply_defaults(&mut input, &inventory_defaults(layout, id).await?)?;
    }

    let session: RoastSession = serde_json::from_value(input)
        .with_context(|| format!("Malformed session in {}", input_path.display()))?;

    let store = SessionStore::new(open_database(layout).await?);
    let appended = store.append(&session).await?;
    println!("Saved session {} as line {}", appended.id, appended.line_number);
    Ok(())
}

async fn list(layout: &RootFolderInitializer) -> Result<()> {
    let store = SessionStore::new(open_database(layout).await?);
    let rows = store.rows().await?;
    if rows.is_empty() {
        println!("No sessions logged yet.");
        return Ok(());
    }

    println!(
        "{:>5}  {:<10}  {:<20}  {:<12}  {:>8}  {:>6}",
        "line", "date", "supplier", "country", "end °F", "agtron"
    );
    for row in &rows {
        let cell = |column: &str| row.get(column).unwrap_or("NaN").to_string();
        println!(
            "{:>5}  {:<10}  {:<20}  {:<12}  {:>8}  {:>6}",
            cell("line_number"),
            cell("roast_date"),
            cell("supplier"),
            cell("country"),
            cell("end_temp_f"),
            cell("agtron"),
        );
    }
    Ok(())
}

async fn inventory_add(layout: &RootFolderInitializer, input_path: &Path) -> Result<()> {
    let bean: BeanMetadata = serde_json::from_value(read_json(input_path)?)
        .with_context(|| format!("Malformed bean metadata in {}", input_path.display()))?;
    let id = InventoryStore::new(open_database(layout).await?).add(&bean).await?;
    println!("Added inventory lot {}", id);
    Ok(())
}

async fn inventory_list(layout: &RootFolderInitializer) -> Result<()> {
    let entries = InventoryStore::new(open_database(layout).await?).list().await?;
    if entries.is_empty() {
        println!("Inventory is empty.");
    }
    for entry in entries {
        println!("{}", entry.summary());
    }
    Ok(())
}

async fn inventory_remove(layout: &RootFolderInitializer, id: i64) -> Result<()> {
    let entry = InventoryStore::new(open_database(layout).await?).remove(id).await?;
    println!("Removed inventory lot {}", entry.summary());
    Ok(())
}

fn init_config(explicit: Option<&Path>, root: &Path, force: bool) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => default_config_path().context("No platform config directory; pass --config")?,
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to replace it)", path.display());
    }

    let config = TomlConfig {
        root_folder: Some(root.to_path_buf()),
        ..TomlConfig::default()
    };
    write_toml_config(&config, &path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
