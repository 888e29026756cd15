//! The storage seam the executor writes through (§4.6). Kept as a trait
//! rather than a concrete Postgres type so the executor can be exercised
//! without a database; `dbgen-persistence` provides the real
//! Diesel-backed implementation.

use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

use dbgen_entity::LoadEntity;

use crate::errors::RunError;

pub trait MetaBackend: Send + Sync {
    fn start_run(
        &self,
        run_id: Uuid,
        include_csv: Option<&str>,
        exclude_csv: Option<&str>,
        start_gen: Option<&str>,
        until_gen: Option<&str>,
    ) -> Result<(), RunError>;

    fn complete_run(&self, run_id: Uuid, status: &str) -> Result<(), RunError>;

    fn start_generator_run(&self, run_id: Uuid, generator: &str) -> Result<(), RunError>;

    #[allow(clippy::too_many_arguments)]
    fn complete_generator_run(
        &self,
        run_id: Uuid,
        generator: &str,
        status: &str,
        runtime: f64,
        rate: f64,
        n_inputs: i64,
        error: Option<&str>,
    ) -> Result<(), RunError>;

    fn is_repeat(&self, generator: &str, input_hash: &str) -> Result<bool, RunError>;

    fn record_repeat(&self, generator: &str, input_hash: &str, run_id: Uuid) -> Result<(), RunError>;

    fn record_row_error(&self, run_id: Uuid, generator: &str, input_hash: Option<&str>, traceback: &str) -> Result<(), RunError>;

    fn flush_load_batch(&self, load_entity: &LoadEntity, rows: &[(Uuid, BTreeMap<String, Value>)]) -> Result<(), RunError>;
}

/// In-process backend for tests (§8's boundary scenarios exercise this
/// rather than a live database). Mirrors the shape of an in-memory event
/// store: plain `Mutex`-guarded collections, no pooling or retries.
pub mod in_memory {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    pub struct InMemoryMetaBackend {
        repeats: Mutex<BTreeSet<(String, String)>>,
        row_errors: Mutex<Vec<(Uuid, String, Option<String>, String)>>,
        loaded: Mutex<HashMap<String, Vec<(Uuid, BTreeMap<String, Value>)>>>,
        generator_runs: Mutex<HashMap<(Uuid, String), String>>,
    }

    impl InMemoryMetaBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn repeat_count(&self) -> usize {
            self.repeats.lock().unwrap().len()
        }

        pub fn row_error_count(&self) -> usize {
            self.row_errors.lock().unwrap().len()
        }

        pub fn loaded_rows(&self, fulltablename: &str) -> Vec<(Uuid, BTreeMap<String, Value>)> {
            self.loaded.lock().unwrap().get(fulltablename).cloned().unwrap_or_default()
        }

        pub fn generator_status(&self, run_id: Uuid, generator: &str) -> Option<String> {
            self.generator_runs.lock().unwrap().get(&(run_id, generator.to_string())).cloned()
        }
    }

    impl MetaBackend for InMemoryMetaBackend {
        fn start_run(&self, _run_id: Uuid, _i: Option<&str>, _e: Option<&str>, _s: Option<&str>, _u: Option<&str>) -> Result<(), RunError> {
            Ok(())
        }

        fn complete_run(&self, _run_id: Uuid, _status: &str) -> Result<(), RunError> {
            Ok(())
        }

        fn start_generator_run(&self, run_id: Uuid, generator: &str) -> Result<(), RunError> {
            self.generator_runs.lock().unwrap().insert((run_id, generator.to_string()), "running".to_string());
            Ok(())
        }

        fn complete_generator_run(
            &self,
            run_id: Uuid,
            generator: &str,
            status: &str,
            _runtime: f64,
            _rate: f64,
            _n_inputs: i64,
            _error: Option<&str>,
        ) -> Result<(), RunError> {
            self.generator_runs.lock().unwrap().insert((run_id, generator.to_string()), status.to_string());
            Ok(())
        }

        fn is_repeat(&self, generator: &str, input_hash: &str) -> Result<bool, RunError> {
            Ok(self.repeats.lock().unwrap().contains(&(generator.to_string(), input_hash.to_string())))
        }

        fn record_repeat(&self, generator: &str, input_hash: &str, _run_id: Uuid) -> Result<(), RunError> {
            self.repeats.lock().unwrap().insert((generator.to_string(), input_hash.to_string()));
            Ok(())
        }

        fn record_row_error(&self, run_id: Uuid, generator: &str, input_hash: Option<&str>, traceback: &str) -> Result<(), RunError> {
            self.row_errors.lock().unwrap().push((run_id, generator.to_string(), input_hash.map(str::to_string), traceback.to_string()));
            Ok(())
        }

        fn flush_load_batch(&self, load_entity: &LoadEntity, rows: &[(Uuid, BTreeMap<String, Value>)]) -> Result<(), RunError> {
            if rows.is_empty() {
                return Ok(());
            }
            let mut loaded = self.loaded.lock().unwrap();
            let entry = loaded.entry(load_entity.fulltablename()).or_default();
            for (pk, row) in rows {
                if let Some(existing) = entry.iter_mut().find(|(existing_pk, _)| existing_pk == pk) {
                    existing.1 = row.clone();
                } else {
                    entry.push((*pk, row.clone()));
                }
            }
            Ok(())
        }
    }
}
