//! `Model`: a model's generators plus the `run(...)` entry point (§6
//! "Model declaration surface", "Run control").

use std::collections::{BTreeMap, BTreeSet};

use log::{error, info, warn};
use serde_json::Value;
use uuid::Uuid;

use dbgen_core::{plan, GeneratorSummary, Node, PlanEntry};

use crate::backend::MetaBackend;
use crate::errors::RunError;
use crate::executor::{run_generator, GeneratorReport, GeneratorStatus};

#[derive(Debug, Default, Clone)]
pub struct RunFilters {
    pub include: BTreeSet<String>,
    pub exclude: BTreeSet<String>,
    pub start: Option<String>,
    pub until: Option<String>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RunFlags {
    pub retry: bool,
    pub serial: bool,
    pub progress: bool,
}

#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub generator_reports: Vec<GeneratorReport>,
}

impl RunReport {
    /// Exit-code contract from §6: `0` on full success, `1` on any
    /// generator failure. Configuration errors never reach this type —
    /// they surface as `Err(RunError::Configuration(_))` (exit `2`).
    pub fn exit_code(&self) -> i32 {
        if self.generator_reports.iter().any(|r| r.status == GeneratorStatus::Failed) {
            1
        } else {
            0
        }
    }
}

#[derive(Default)]
pub struct Model {
    pub generators: Vec<dbgen_core::Generator>,
}

impl Model {
    pub fn new() -> Self {
        Self { generators: Vec::new() }
    }

    pub fn declare_generator(&mut self, generator: dbgen_core::Generator) {
        self.generators.push(generator);
    }

    /// Runs the model's generators in dependency order (§4.4, §4.5),
    /// honoring `include`/`exclude`/`start`/`until` filters and the
    /// `retry`/`serial`/`progress` flags. A generator that fails does not
    /// stop independent generators, but its dependents are marked
    /// `skipped` (§7 "Generator errors", §8 boundary scenario 5).
    pub fn run(&self, backend: &dyn MetaBackend, run_id: Uuid, filters: RunFilters, flags: RunFlags) -> Result<RunReport, RunError> {
        let summaries: Vec<GeneratorSummary> =
            self.generators.iter().map(|g| GeneratorSummary { name: g.name.clone(), dependency: g.dependency() }).collect();

        let execution_plan = plan(&summaries, &filters.include, &filters.exclude, filters.start.as_deref(), filters.until.as_deref())?;

        let include_csv = csv(&filters.include);
        let exclude_csv = csv(&filters.exclude);
        backend.start_run(run_id, include_csv.as_deref(), exclude_csv.as_deref(), filters.start.as_deref(), filters.until.as_deref())?;

        let mut reports = Vec::new();
        let mut unavailable: BTreeSet<String> = BTreeSet::new();

        for entry in &execution_plan.order {
            match entry {
                PlanEntry::Skip(name) => {
                    unavailable.insert(name.clone());
                    if flags.progress {
                        info!("generator '{name}' skipped (excluded or outside start/until slice)");
                    }
                }
                PlanEntry::Run(name) => {
                    let generator = self.generators.iter().find(|g| &g.name == name).ok_or_else(|| {
                        RunError::Configuration(format!("generator '{name}' vanished from the model between planning and execution"))
                    })?;

                    if generator_depends_on_any(generator, &unavailable, &summaries) {
                        unavailable.insert(name.clone());
                        backend.start_generator_run(run_id, name)?;
                        backend.complete_generator_run(run_id, name, GeneratorStatus::Skipped.as_str(), 0.0, 0.0, 0, None)?;
                        reports.push(GeneratorReport {
                            name: name.clone(),
                            status: GeneratorStatus::Skipped,
                            n_inputs: 0,
                            n_errors: 0,
                            n_skipped: 0,
                            runtime_secs: 0.0,
                            rate: 0.0,
                            error: None,
                        });
                        if flags.progress {
                            warn!("generator '{name}' skipped: depends on a failed or skipped generator");
                        }
                        continue;
                    }

                    backend.start_generator_run(run_id, name)?;
                    if flags.progress {
                        info!("running generator '{name}'");
                    }

                    let records = extract_records(generator);
                    let report = run_generator(generator, run_id, backend, records, flags.retry, flags.serial)?;

                    backend.complete_generator_run(
                        run_id,
                        name,
                        report.status.as_str(),
                        report.runtime_secs,
                        report.rate,
                        report.n_inputs as i64,
                        report.error.as_deref(),
                    )?;

                    if report.status == GeneratorStatus::Failed {
                        unavailable.insert(name.clone());
                        if let Some(msg) = &report.error {
                            error!("generator '{name}' failed: {msg}");
                        }
                    }
                    reports.push(report);
                }
            }
        }

        let overall_status = if reports.iter().any(|r| r.status == GeneratorStatus::Failed) { "failed" } else { "completed" };
        backend.complete_run(run_id, overall_status)?;

        Ok(RunReport { run_id, generator_reports: reports })
    }
}

fn csv(names: &BTreeSet<String>) -> Option<String> {
    if names.is_empty() {
        None
    } else {
        Some(names.iter().cloned().collect::<Vec<_>>().join(","))
    }
}

/// Whether `generator`'s declared dependency overlaps a table/column
/// yielded by any generator in `unavailable` — i.e. whether it transitively
/// depends on something that failed or was skipped (§7, §8 scenario 5).
fn generator_depends_on_any(generator: &dbgen_core::Generator, unavailable: &BTreeSet<String>, summaries: &[GeneratorSummary]) -> bool {
    if unavailable.is_empty() {
        return false;
    }
    let dep = generator.dependency();
    summaries.iter().filter(|s| unavailable.contains(&s.name)).any(|s| {
        !s.dependency.tables_yielded.is_disjoint(&dep.tables_needed) || !s.dependency.columns_yielded.is_disjoint(&dep.columns_needed)
    })
}

fn extract_records(generator: &dbgen_core::Generator) -> Vec<BTreeMap<String, Value>> {
    match &generator.extract {
        Node::Extract(spec) => spec.extract().collect(),
        _ => Vec::new(),
    }
}
