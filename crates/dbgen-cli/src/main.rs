//! dbgen-cli: command-line entry point for a DBgen model (§6 "Run control").
//!
//! This binary wires a model declared in code to the Postgres-backed meta
//! store and prints a per-generator summary. Declaring entities/generators
//! programmatically (rather than loading them from a config file) matches
//! §1's "out of scope: configuration file loading" boundary — a real
//! deployment links its own model module in here.

use std::collections::BTreeSet;
use std::process::ExitCode;

use clap::Parser;
use uuid::Uuid;

use dbgen_persistence::{build_data_pool, build_pool, ConnectionProvider, DbConfig, MetaStore, PoolProvider};
use dbgen_runtime::{Model, RunError, RunFilters, RunFlags};

#[derive(Parser, Debug)]
#[command(name = "dbgen", about = "Run a DBgen model's generators against a database")]
struct Cli {
    /// Restrict execution to these generator names (comma-separated).
    #[arg(long, value_delimiter = ',')]
    include: Vec<String>,

    /// Exclude these generator names (comma-separated); they still occupy
    /// the topology so dependents resolve correctly.
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Start the executed slice at this generator in topological order.
    #[arg(long)]
    start: Option<String>,

    /// End the executed slice at this generator in topological order.
    #[arg(long)]
    until: Option<String>,

    /// Bypass repeat suppression for every generator, not only `io`-tagged
    /// ones.
    #[arg(long)]
    retry: bool,

    /// Disable `parallel`-tagged generators' worker pool.
    #[arg(long)]
    serial: bool,

    /// Log per-generator progress as it happens.
    #[arg(long)]
    progress: bool,

    /// Drop and recreate the meta-tables before running.
    #[arg(long)]
    nuke: bool,

    /// Explicit run id; auto-assigned (`uuid::Uuid::new_v4`) if absent.
    #[arg(long)]
    run_id: Option<Uuid>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let model = build_model();

    match execute(&cli, &model) {
        Ok(report) => {
            for g in &report.generator_reports {
                println!(
                    "{:<24} {:<10} n_inputs={:<6} errors={:<4} skipped={:<4} rate={:.2}/s",
                    g.name,
                    g.status.as_str(),
                    g.n_inputs,
                    g.n_errors,
                    g.n_skipped,
                    g.rate
                );
            }
            ExitCode::from(report.exit_code() as u8)
        }
        Err(RunError::Configuration(msg)) => {
            eprintln!("configuration error: {msg}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("run aborted: {e}");
            ExitCode::from(2)
        }
    }
}

fn execute(cli: &Cli, model: &Model) -> Result<dbgen_runtime::RunReport, RunError> {
    let config = DbConfig::from_env();
    let meta_config = config.meta();

    let meta_pool = build_pool(&meta_config.url, meta_config.min_connections, meta_config.max_connections)
        .map_err(|e| RunError::Persistence(e.to_string()))?;
    {
        let mut conn = meta_pool.get().map_err(|e| RunError::Persistence(e.to_string()))?;
        if cli.nuke {
            dbgen_persistence::migrations::nuke_meta_tables(&mut conn).map_err(|e| RunError::Persistence(e.to_string()))?;
        } else if !dbgen_persistence::migrations::meta_tables_present(&mut conn).map_err(|e| RunError::Persistence(e.to_string()))? {
            return Err(RunError::Configuration("meta-tables are missing; pass --nuke to create them".to_string()));
        }
    }

    // Same instance in the common case (`META_DATABASE_URL` unset) — only
    // a distinct override pays for a second pool.
    let data_pool = if meta_config.url == config.url {
        meta_pool.clone()
    } else {
        build_data_pool(&config.url, config.min_connections, config.max_connections).map_err(|e| RunError::Persistence(e.to_string()))?
    };

    let backend = MetaStore::new(PoolProvider { pool: meta_pool }, PoolProvider { pool: data_pool });
    let run_id = cli.run_id.unwrap_or_else(Uuid::new_v4);

    let filters = RunFilters {
        include: cli.include.iter().cloned().collect::<BTreeSet<_>>(),
        exclude: cli.exclude.iter().cloned().collect::<BTreeSet<_>>(),
        start: cli.start.clone(),
        until: cli.until.clone(),
    };
    let flags = RunFlags { retry: cli.retry, serial: cli.serial, progress: cli.progress };

    let adapter = meta_backend_adapter(&backend);
    model.run(&adapter, run_id, filters, flags)
}

/// Bridges `dbgen_persistence::MetaStore` (generic over `ConnectionProvider`)
/// to the `dbgen_runtime::MetaBackend` object-safe trait the executor
/// expects, mapping `PersistenceError` into the run-level error type.
fn meta_backend_adapter<M: ConnectionProvider, D: ConnectionProvider>(store: &MetaStore<M, D>) -> impl dbgen_runtime::MetaBackend + '_ {
    dbgen_persistence::RuntimeAdapter(store)
}

fn build_model() -> Model {
    // A real deployment declares its own entities and generators in a
    // separate module and constructs the model from them; this binary
    // ships with none so `dbgen run` against an empty model is a no-op
    // rather than a compile error.
    Model::new()
}
