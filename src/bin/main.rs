//! Vantage CLI - compile intents to SQL against a semantic model
//!
//! Usage:
//!   vantage compile <intent.json> [--model <model.toml>] [--dialect <dialect>] [--today <date>]
//!   vantage catalog [--model <model.toml>]
//!   vantage search <keywords...> [--model <model.toml>]
//!   vantage check [--model <model.toml>]
//!
//! Examples:
//!   vantage compile intent.json --model retail.toml --dialect postgres
//!   vantage compile intent.json --model retail.toml --display
//!   vantage search revenue region --model retail.toml

use async_trait::async_trait;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use vantage::config::Settings;
use vantage::intent::Intent;
use vantage::model::{CatalogEntry, SemanticModel};
use vantage::orchestrator::{
    ExecutionError, Orchestrator, Plan, PlannedQuery, QueryExecutor, ResultSet,
};
use vantage::planner::CompiledQuery;
use vantage::sql::Dialect;
use vantage::validation::UserContext;

#[derive(Parser)]
#[command(name = "vantage")]
#[command(about = "Vantage - compile analytical intents to parameter-bound SQL")]
#[command(version)]
struct Cli {
    /// Path to the semantic model (defaults to `model_path` from settings)
    #[arg(short, long, global = true)]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an intent (JSON) to SQL without executing it
    Compile {
        /// Path to the intent JSON file
        intent: PathBuf,

        /// SQL dialect to generate (defaults to settings)
        #[arg(short, long)]
        dialect: Option<Dialect>,

        /// Anchor relative time ranges on this date instead of today
        #[arg(long)]
        today: Option<NaiveDate>,

        /// Caller context JSON (user id, scopes, cost tier)
        #[arg(short, long)]
        user: Option<PathBuf>,

        /// Print SQL with values inlined instead of the full plan
        #[arg(long)]
        display: bool,
    },

    /// List metrics and dimensions
    Catalog,

    /// Keyword search over names, descriptions and synonyms
    Search {
        #[arg(required = true)]
        keywords: Vec<String>,
    },

    /// Validate a semantic model without compiling anything
    Check,
}

/// Executor for dry runs; `plan` never calls it.
struct NoDatabase;

#[async_trait]
impl QueryExecutor for NoDatabase {
    async fn execute(&self, _query: &CompiledQuery) -> Result<ResultSet, ExecutionError> {
        Err(ExecutionError::Unavailable(
            "the CLI compiles only".to_string(),
        ))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let model = match load_model(cli.model.as_deref(), &settings) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error loading model: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Compile {
            intent,
            dialect,
            today,
            user,
            display,
        } => cmd_compile(model, &settings, &intent, dialect, today, user, display),
        Commands::Catalog => cmd_catalog(&model),
        Commands::Search { keywords } => cmd_search(&model, &keywords),
        Commands::Check => cmd_check(&model),
    }
}

fn load_model(path: Option<&Path>, settings: &Settings) -> Result<SemanticModel, vantage::Error> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => settings.resolved_model_path()?,
    };
    debug!(path = %path.display(), "loading model");
    Ok(SemanticModel::from_file(&path)?)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let source = fs::read_to_string(path)
        .map_err(|e| format!("Error reading file '{}': {}", path.display(), e))?;
    serde_json::from_str(&source).map_err(|e| format!("Invalid JSON in '{}': {}", path.display(), e))
}

fn cmd_compile(
    model: SemanticModel,
    settings: &Settings,
    intent_path: &Path,
    dialect: Option<Dialect>,
    today: Option<NaiveDate>,
    user_path: Option<PathBuf>,
    display: bool,
) -> ExitCode {
    let intent: Intent = match read_json(intent_path) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let user: UserContext = match user_path {
        Some(path) => match read_json(&path) {
            Ok(u) => u,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => UserContext::default(),
    };

    let mut orchestrator =
        Orchestrator::new(Arc::new(model), Arc::new(NoDatabase)).with_settings(settings);
    if let Some(d) = dialect {
        orchestrator = orchestrator.with_dialect(d);
    }
    if let Some(d) = today {
        orchestrator = orchestrator.with_today(d);
    }

    let plan = match orchestrator.plan(&intent, &user) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if display {
        print_display(&plan);
        return ExitCode::SUCCESS;
    }

    match serde_json::to_string_pretty(&plan) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing plan: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_display(plan: &Plan) {
    let print_query = |q: &PlannedQuery| {
        println!("-- {}", q.compiled.explanation);
        println!(
            "-- est. scan {} bytes, {} rows out",
            q.cost.scan_bytes, q.cost.output_rows
        );
        println!("{};", q.compiled.display_sql);
    };

    match plan {
        Plan::Single(q) => print_query(q),
        Plan::Diagnostic { sub_queries, .. } => {
            for (i, sub) in sub_queries.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                println!("-- {} sub-query", sub.kind);
                print_query(&sub.query);
            }
        }
    }
}

fn print_entries(title: &str, entries: &[CatalogEntry]) {
    println!("{}:", title);
    for e in entries {
        if e.synonyms.is_empty() {
            println!("  - {} ({})", e.name, e.source);
        } else {
            println!(
                "  - {} ({}) aka {}",
                e.name,
                e.source,
                e.synonyms.join(", ")
            );
        }
    }
    println!();
}

fn cmd_catalog(model: &SemanticModel) -> ExitCode {
    let catalog = model.catalog();
    print_entries("Metrics", &catalog.metrics);
    print_entries("Dimensions", &catalog.dimensions);
    ExitCode::SUCCESS
}

fn cmd_search(model: &SemanticModel, keywords: &[String]) -> ExitCode {
    let hits = model.search(keywords);
    if hits.is_empty() {
        println!("No matches.");
        return ExitCode::SUCCESS;
    }

    let metrics: Vec<CatalogEntry> = hits.metrics.iter().map(|m| CatalogEntry::from(*m)).collect();
    let dimensions: Vec<CatalogEntry> =
        hits.dimensions.iter().map(|d| CatalogEntry::from(*d)).collect();
    if !metrics.is_empty() {
        print_entries("Metrics", &metrics);
    }
    if !dimensions.is_empty() {
        print_entries("Dimensions", &dimensions);
    }
    ExitCode::SUCCESS
}

fn cmd_check(model: &SemanticModel) -> ExitCode {
    println!(
        "OK: fact table '{}', {} tables, {} dimensions, {} metrics, {} relationships",
        model.fact_table(),
        model.tables().len(),
        model.dimensions().len(),
        model.metrics().len(),
        model.relationships().len()
    );
    ExitCode::SUCCESS
}
