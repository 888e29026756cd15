//! Per-generator execution (§4.5): stream the extractor, suppress
//! repeats, invoke nodes in topological order, isolate row-level
//! failures, and flush Load batches.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use rayon::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use dbgen_core::hashing::hash_value;
use dbgen_core::{Generator, Namespace, Node, NodeError};

use crate::backend::MetaBackend;
use crate::errors::RunError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorStatus {
    Completed,
    Failed,
    Skipped,
}

impl GeneratorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GeneratorStatus::Completed => "completed",
            GeneratorStatus::Failed => "failed",
            GeneratorStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorReport {
    pub name: String,
    pub status: GeneratorStatus,
    pub n_inputs: u64,
    pub n_errors: u64,
    pub n_skipped: u64,
    pub runtime_secs: f64,
    pub rate: f64,
    pub error: Option<String>,
}

/// `n / d`, `0.0` when `d` is zero (a zero-duration or empty-extract run
/// must not panic on division — §8 boundary scenario 1).
fn safe_div(n: f64, d: f64) -> f64 {
    if d == 0.0 {
        0.0
    } else {
        n / d
    }
}

enum RowOutcome {
    Skipped,
    Success { input_hash: String, loads: Vec<(String, Uuid, BTreeMap<String, Value>)> },
    ExternalError { input_hash: String, message: String },
    Fatal(String),
}

fn process_row(
    generator: &Generator,
    generator_hash: &str,
    sorted_nodes: &[&Node],
    backend: &dyn MetaBackend,
    retry: bool,
    record: BTreeMap<String, Value>,
) -> RowOutcome {
    let input_hash = hash_value(&serde_json::json!({ "generator_hash": generator_hash, "record": &record }));

    match backend.is_repeat(&generator.name, &input_hash) {
        Ok(true) if !retry => return RowOutcome::Skipped,
        Ok(_) => {}
        Err(e) => return RowOutcome::Fatal(e.to_string()),
    }

    let mut namespace: Namespace = HashMap::new();
    namespace.insert(generator.extract.hash().to_string(), record);

    let mut loads = Vec::new();
    for node in sorted_nodes {
        match node {
            Node::Extract(_) => continue,
            Node::Transform(t) => match t.invoke(&namespace) {
                Ok(outputs) => {
                    namespace.insert(t.hash.clone(), outputs);
                }
                Err(NodeError::ExternalError { message, .. }) => {
                    return RowOutcome::ExternalError { input_hash, message };
                }
                Err(other) => return RowOutcome::Fatal(other.to_string()),
            },
            Node::Load(l) => match l.invoke(&namespace) {
                Ok(invocation) => {
                    let mut out = BTreeMap::new();
                    out.insert("out".to_string(), Value::String(invocation.pk.to_string()));
                    namespace.insert(l.hash.clone(), out);
                    loads.push((l.hash.clone(), invocation.pk, invocation.row));
                }
                Err(other) => return RowOutcome::Fatal(other.to_string()),
            },
        }
    }

    RowOutcome::Success { input_hash, loads }
}

/// Runs one generator to completion against `records`, honoring the
/// `io`/`parallel` tag policies (§4.5). Does not touch the `run`/`gen_run`
/// meta-rows' status transitions directly beyond what's needed to report
/// back to the caller — `Model::run` owns that bookkeeping so it can also
/// record configuration-level failures uniformly.
pub fn run_generator(
    generator: &Generator,
    run_id: Uuid,
    backend: &dyn MetaBackend,
    records: Vec<BTreeMap<String, Value>>,
    retry: bool,
    serial: bool,
) -> Result<GeneratorReport, RunError> {
    let sorted_nodes = generator.sorted_nodes()?;
    let generator_hash = generator.hash();
    let load_entities: HashMap<String, &dbgen_entity::LoadEntity> = generator
        .loads
        .iter()
        .filter_map(|n| match n {
            Node::Load(l) => Some((l.hash.clone(), &l.load_entity)),
            _ => None,
        })
        .collect();

    let effective_retry = retry || generator.has_tag("io");
    let effective_parallel = generator.has_tag("parallel") && !serial && !generator.has_tag("io");

    let n_inputs = records.len() as u64;
    let started = Instant::now();

    let outcomes: Vec<RowOutcome> = if effective_parallel {
        records.into_par_iter().map(|r| process_row(generator, &generator_hash, &sorted_nodes, backend, effective_retry, r)).collect()
    } else {
        records.into_iter().map(|r| process_row(generator, &generator_hash, &sorted_nodes, backend, effective_retry, r)).collect()
    };

    // Every row's outcome is committed as it's visited, regardless of
    // whether some other row in the same batch turns out fatal — the
    // repeats table and staged Load rows for rows that already succeeded
    // must survive a later row's fatal failure (§4.5 step 3f: "repeats-table
    // writes happen at end-of-row regardless").
    let mut n_errors = 0u64;
    let mut n_skipped = 0u64;
    let mut fatal_message: Option<String> = None;
    let mut batches: HashMap<String, Vec<(Uuid, BTreeMap<String, Value>)>> = HashMap::new();

    for outcome in outcomes {
        match outcome {
            RowOutcome::Skipped => n_skipped += 1,
            RowOutcome::ExternalError { input_hash, message } => {
                n_errors += 1;
                backend.record_row_error(run_id, &generator.name, Some(&input_hash), &message)?;
            }
            RowOutcome::Success { input_hash, loads } => {
                backend.record_repeat(&generator.name, &input_hash, run_id)?;
                for (load_hash, pk, row) in loads {
                    batches.entry(load_hash).or_default().push((pk, row));
                }
            }
            RowOutcome::Fatal(message) => {
                if fatal_message.is_none() {
                    fatal_message = Some(message);
                }
            }
        }
    }

    for (load_hash, rows) in &batches {
        if let Some(load_entity) = load_entities.get(load_hash) {
            backend.flush_load_batch(load_entity, rows)?;
        }
    }

    let runtime_secs = started.elapsed().as_secs_f64();
    let status = if fatal_message.is_some() { GeneratorStatus::Failed } else { GeneratorStatus::Completed };
    Ok(GeneratorReport {
        name: generator.name.clone(),
        status,
        n_inputs,
        n_errors,
        n_skipped,
        runtime_secs,
        rate: safe_div(n_inputs as f64, runtime_secs),
        error: fatal_message,
    })
}
