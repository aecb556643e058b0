//! Command line entry point.
//!
//! Every command prints a JSON document on stdout. Failures print
//! `{code, message, status}` instead and exit non-zero; logs go to stderr.

use anyhow::Result;
use clap::{Parser, Subcommand};
use oneclick::{AppError, Settings, Workspace};
use oneclick_data::TaskType;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "One-click tabular ML: upload a CSV, train, promote, predict",
    long_about = "Validate a CSV, train a catalog model on it, and serve predictions from the\n\
                  promoted version.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  ONECLICK_STORAGE_DIR   Storage root (default: storage)\n  \
                  ONECLICK_TRACKING_DIR  Tracking root (default: <storage>/mlruns)\n  \
                  ONECLICK_EXPERIMENT    Experiment name (default: one_click_ml)\n\n\
                  EXAMPLES:\n  \
                  oneclick upload churn.csv --task classification --target label\n  \
                  oneclick train proj_1a2b3c4d --model random_forest_classifier\n  \
                  oneclick promote --model random_forest_classifier --version 1\n  \
                  oneclick predict --model random_forest_classifier --record '{\"age\": 41}'"
)]
struct Cli {
    /// Storage root for projects and the project index
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    /// Directory for tracking runs and registered models
    #[arg(long, global = true)]
    tracking_dir: Option<PathBuf>,

    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a CSV and create a project from it
    Upload {
        file: PathBuf,

        /// classification or regression; inferred from the target when omitted
        #[arg(long)]
        task: Option<TaskType>,

        /// Target column; inferred from the column names when omitted
        #[arg(long)]
        target: Option<String>,
    },

    /// List projects, most recent first
    Projects,

    /// Show a project's summary, EDA and training results
    Project { project_id: String },

    /// Delete a project (succeeds if it is already gone)
    Delete { project_id: String },

    /// Show a project's EDA chart data
    Eda { project_id: String },

    /// Suggest models for a project's task
    Suggest { project_id: String },

    /// Train a model on a project
    Train {
        project_id: String,

        /// Catalog model id, e.g. logistic_regression
        #[arg(long, required_unless_present = "all", conflicts_with = "all")]
        model: Option<String>,

        /// Train every candidate for the task and keep the best
        #[arg(long)]
        all: bool,
    },

    /// Move a registered version to production
    Promote {
        #[arg(long)]
        model: String,

        #[arg(long)]
        version: u32,
    },

    /// List registered versions of a model
    Versions {
        #[arg(long)]
        model: String,
    },

    /// Predict one record with the production version of a model
    Predict {
        #[arg(long)]
        model: String,

        /// JSON object of column values
        #[arg(long)]
        record: String,
    },
}

/// Initialize the tracing subscriber on stderr.
///
/// `RUST_LOG` wins over the verbosity flags.
fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let mut settings = Settings::from_env();
    if let Some(dir) = cli.storage_dir {
        settings = settings.with_storage_dir(dir);
    }
    if let Some(dir) = cli.tracking_dir {
        settings = settings.with_tracking_dir(dir);
    }
    debug!(?settings, "settings resolved");

    match run(settings, cli.command) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&err)?);
            Ok(ExitCode::from(if err.is_client_error() { 1 } else { 2 }))
        }
    }
}

fn run(settings: Settings, command: Command) -> Result<Value, AppError> {
    let workspace = Workspace::open(settings)?;

    match command {
        Command::Upload { file, task, target } => {
            to_json(workspace.upload(&file, task, target.as_deref())?)
        }
        Command::Projects => to_json(workspace.list_projects()?),
        Command::Project { project_id } => to_json(workspace.get_project(&project_id)?),
        Command::Delete { project_id } => to_json(workspace.delete_project(&project_id)?),
        Command::Eda { project_id } => to_json(workspace.eda(&project_id)?),
        Command::Suggest { project_id } => to_json(workspace.suggestions(&project_id)?),
        Command::Train {
            project_id,
            model,
            all,
        } => match model {
            Some(model) if !all => to_json(workspace.train(&project_id, &model)?),
            _ => to_json(workspace.train_best(&project_id)?),
        },
        Command::Promote { model, version } => to_json(workspace.promote(&model, version)?),
        Command::Versions { model } => to_json(workspace.versions(&model)?),
        Command::Predict { model, record } => {
            to_json(workspace.predict(&model, &parse_record(&record)?)?)
        }
    }
}

fn parse_record(raw: &str) -> Result<Map<String, Value>, AppError> {
    match serde_json::from_str(raw) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(_) => Err(AppError::validation("--record must be a JSON object")),
        Err(e) => Err(AppError::validation(format!("--record is not valid JSON: {e}"))),
    }
}

fn to_json(value: impl Serialize) -> Result<Value, AppError> {
    Ok(serde_json::to_value(value)?)
}
