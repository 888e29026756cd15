//! Bridges [`MetaStore`] to [`dbgen_runtime::MetaBackend`] so the executor
//! can write through a live Postgres connection without depending on
//! Diesel directly.

use std::collections::BTreeMap;

use dbgen_entity::LoadEntity;
use dbgen_runtime::{MetaBackend, RunError};
use serde_json::Value;
use uuid::Uuid;

use crate::pg::{ConnectionProvider, MetaStore};

impl From<crate::error::PersistenceError> for RunError {
    fn from(e: crate::error::PersistenceError) -> Self {
        RunError::Persistence(e.to_string())
    }
}

pub struct RuntimeAdapter<'a, M: ConnectionProvider, D: ConnectionProvider = M>(pub &'a MetaStore<M, D>);

impl<M: ConnectionProvider, D: ConnectionProvider> MetaBackend for RuntimeAdapter<'_, M, D> {
    fn start_run(
        &self,
        run_id: Uuid,
        include_csv: Option<&str>,
        exclude_csv: Option<&str>,
        start_gen: Option<&str>,
        until_gen: Option<&str>,
    ) -> Result<(), RunError> {
        Ok(self.0.start_run(run_id, include_csv, exclude_csv, start_gen, until_gen)?)
    }

    fn complete_run(&self, run_id: Uuid, status: &str) -> Result<(), RunError> {
        Ok(self.0.complete_run(run_id, status)?)
    }

    fn start_generator_run(&self, run_id: Uuid, generator: &str) -> Result<(), RunError> {
        Ok(self.0.start_generator_run(run_id, generator)?)
    }

    fn complete_generator_run(
        &self,
        run_id: Uuid,
        generator: &str,
        status: &str,
        runtime: f64,
        rate: f64,
        n_inputs: i64,
        error: Option<&str>,
    ) -> Result<(), RunError> {
        Ok(self.0.complete_generator_run(run_id, generator, status, runtime, rate, n_inputs, error)?)
    }

    fn is_repeat(&self, generator: &str, input_hash: &str) -> Result<bool, RunError> {
        Ok(self.0.is_repeat(generator, input_hash)?)
    }

    fn record_repeat(&self, generator: &str, input_hash: &str, run_id: Uuid) -> Result<(), RunError> {
        Ok(self.0.record_repeat(generator, input_hash, run_id)?)
    }

    fn record_row_error(&self, run_id: Uuid, generator: &str, input_hash: Option<&str>, traceback: &str) -> Result<(), RunError> {
        Ok(self.0.record_row_error(run_id, generator, input_hash, traceback)?)
    }

    fn flush_load_batch(&self, load_entity: &LoadEntity, rows: &[(Uuid, BTreeMap<String, Value>)]) -> Result<(), RunError> {
        Ok(self.0.flush_load_batch(load_entity, rows)?)
    }
}
