//! Postgres (Diesel) implementation of the meta-tables (§4.6) and the
//! bulk-load path for `Load` batches (§4.5 step 4, §6).
//!
//! Mirrors the connection-provider/retry-wrapper shape of the workflow
//! engine's persistence layer this crate is derived from: a
//! `ConnectionProvider` trait for testability, `with_retry` for transient
//! conflicts, and every write inside a single Diesel transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, warn};
use serde_json::Value;
use uuid::Uuid;

use dbgen_entity::LoadEntity;

use crate::error::{is_retryable, PersistenceError};
use crate::migrations::run_pending_migrations;
use crate::schema::{gen_run, repeats, row_errors, run};

pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool.get().map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Retries `f` up to 3 times with a 15/30/45ms backoff when the error is
/// transient (serialization conflicts, dropped connections). Does not
/// change the semantics of `f` — only repeats it.
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
where
    F: FnMut() -> Result<T, PersistenceError>,
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * (attempts + 1);
                warn!("retryable persistence error (attempt {}): {e} -> sleeping {delay_ms}ms", attempts + 1);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

#[derive(Queryable, Debug, Clone)]
pub struct RunRow {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: String,
    pub include_csv: Option<String>,
    pub exclude_csv: Option<String>,
    pub start_gen: Option<String>,
    pub until_gen: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = run)]
struct NewRunRow<'a> {
    id: Uuid,
    status: &'a str,
    include_csv: Option<&'a str>,
    exclude_csv: Option<&'a str>,
    start_gen: Option<&'a str>,
    until_gen: Option<&'a str>,
}

#[derive(Insertable)]
#[diesel(table_name = gen_run)]
struct NewGenRunRow<'a> {
    run_id: Uuid,
    generator_id: &'a str,
    status: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = row_errors)]
struct NewRowErrorRow<'a> {
    run_id: Uuid,
    generator_id: &'a str,
    input_hash: Option<&'a str>,
    traceback: &'a str,
}

/// Implementation of §4.6's `run`/`gen_run`/`repeats`/`row_errors`
/// operations, plus the `Load` bulk-flush path. These two concerns resolve
/// their connections independently (`meta`/`data`) so a `META_DATABASE_URL`
/// override actually takes effect — bookkeeping keeps working even if the
/// two happen to point at the same instance, the common case.
pub struct MetaStore<M: ConnectionProvider, D: ConnectionProvider = M> {
    meta: M,
    data: D,
}

impl<M: ConnectionProvider, D: ConnectionProvider> MetaStore<M, D> {
    pub fn new(meta: M, data: D) -> Self {
        Self { meta, data }
    }

    pub fn start_run(
        &self,
        run_id: Uuid,
        include_csv: Option<&str>,
        exclude_csv: Option<&str>,
        start_gen: Option<&str>,
        until_gen: Option<&str>,
    ) -> Result<(), PersistenceError> {
        with_retry(|| {
            let mut conn = self.meta.connection()?;
            diesel::insert_into(run::table)
                .values(NewRunRow { id: run_id, status: "running", include_csv, exclude_csv, start_gen, until_gen })
                .execute(&mut conn)?;
            Ok(())
        })
    }

    pub fn complete_run(&self, run_id: Uuid, status: &str) -> Result<(), PersistenceError> {
        with_retry(|| {
            let mut conn = self.meta.connection()?;
            diesel::update(run::table.filter(run::id.eq(run_id)))
                .set((run::status.eq(status), run::ended_at.eq(Utc::now())))
                .execute(&mut conn)?;
            Ok(())
        })
    }

    pub fn start_generator_run(&self, run_id: Uuid, generator_id: &str) -> Result<(), PersistenceError> {
        with_retry(|| {
            let mut conn = self.meta.connection()?;
            diesel::insert_into(gen_run::table)
                .values(NewGenRunRow { run_id, generator_id, status: "running" })
                .execute(&mut conn)?;
            Ok(())
        })
    }

    pub fn complete_generator_run(
        &self,
        run_id: Uuid,
        generator_id: &str,
        status: &str,
        runtime: f64,
        rate: f64,
        n_inputs: i64,
        error: Option<&str>,
    ) -> Result<(), PersistenceError> {
        with_retry(|| {
            let mut conn = self.meta.connection()?;
            diesel::update(gen_run::table.filter(gen_run::run_id.eq(run_id)).filter(gen_run::generator_id.eq(generator_id)))
                .set((
                    gen_run::status.eq(status),
                    gen_run::runtime.eq(runtime),
                    gen_run::rate.eq(rate),
                    gen_run::n_inputs.eq(n_inputs),
                    gen_run::error.eq(error),
                ))
                .execute(&mut conn)?;
            Ok(())
        })
    }

    /// `(generator_id, input_hash)` idempotency check (§4.5 step 3b).
    pub fn is_repeat(&self, generator_id: &str, input_hash: &str) -> Result<bool, PersistenceError> {
        with_retry(|| {
            let mut conn = self.meta.connection()?;
            let count: i64 = repeats::table
                .filter(repeats::generator_id.eq(generator_id))
                .filter(repeats::input_hash.eq(input_hash))
                .count()
                .get_result(&mut conn)?;
            Ok(count > 0)
        })
    }

    /// Idempotent on conflict: double-insertion of the same
    /// `(generator_id, input_hash)` is a no-op (§5 "Locking discipline").
    pub fn record_repeat(&self, generator_id: &str, input_hash: &str, run_id: Uuid) -> Result<(), PersistenceError> {
        with_retry(|| {
            let mut conn = self.meta.connection()?;
            diesel::insert_into(repeats::table)
                .values((repeats::generator_id.eq(generator_id), repeats::input_hash.eq(input_hash), repeats::run_id.eq(run_id)))
                .on_conflict((repeats::generator_id, repeats::input_hash))
                .do_nothing()
                .execute(&mut conn)?;
            Ok(())
        })
    }

    /// Logs an isolated `ExternalError` row (§7 "Row errors").
    pub fn record_row_error(
        &self,
        run_id: Uuid,
        generator_id: &str,
        input_hash: Option<&str>,
        traceback: &str,
    ) -> Result<(), PersistenceError> {
        with_retry(|| {
            let mut conn = self.meta.connection()?;
            diesel::insert_into(row_errors::table)
                .values(NewRowErrorRow { run_id, generator_id, input_hash, traceback })
                .execute(&mut conn)?;
            Ok(())
        })
    }

    /// Flushes a `Load`'s accumulated batch (§4.5 step 4): bulk-inserts
    /// into a temporary table, then upserts into the real table, updating
    /// non-identifying columns only — identifying columns, including the
    /// primary key, are never touched after creation.
    pub fn flush_load_batch(
        &self,
        load_entity: &LoadEntity,
        rows: &[(Uuid, BTreeMap<String, Value>)],
    ) -> Result<(), PersistenceError> {
        if rows.is_empty() {
            return Ok(());
        }
        with_retry(|| {
            let mut conn = self.data.connection()?;
            conn.build_transaction().read_write().run(|conn| -> Result<(), PersistenceError> {
                let temp_table = load_entity.temp_table_name();
                let fulltable = load_entity.fulltablename();

                let mut all_columns: Vec<&str> = rows[0].1.keys().map(String::as_str).collect();
                all_columns.sort_unstable();

                let create_temp = format!(
                    "CREATE TEMP TABLE {temp_table} (pk UUID, {cols}) ON COMMIT DROP",
                    temp_table = temp_table,
                    cols = all_columns.iter().map(|c| format!("\"{c}\" TEXT")).collect::<Vec<_>>().join(", ")
                );
                diesel::sql_query(create_temp).execute(conn)?;

                // Staged as one INSERT per row; a missing/null value is
                // written as the literal `None`, consistent with the Load
                // row map never carrying required-but-absent fields once
                // `LoadSpec::invoke`'s type check has run. Strings are
                // unwrapped to their raw text, not their JSON
                // representation — `"x"` would otherwise fail every cast
                // except `::text` in the upsert's SELECT list.
                for (pk, row) in rows {
                    let mut fields = vec![pk.to_string()];
                    for col in &all_columns {
                        let rendered = match row.get(*col) {
                            None | Some(Value::Null) => "None".to_string(),
                            Some(Value::String(s)) => s.clone(),
                            Some(v) => v.to_string(),
                        };
                        fields.push(rendered);
                    }
                    let insert = format!(
                        "INSERT INTO {temp_table} (pk, {cols}) VALUES ({vals})",
                        temp_table = temp_table,
                        cols = all_columns.iter().map(|c| format!("\"{c}\"")).collect::<Vec<_>>().join(", "),
                        vals = fields.iter().map(|f| format!("'{}'", f.replace('\'', "''"))).collect::<Vec<_>>().join(", ")
                    );
                    diesel::sql_query(insert).execute(conn)?;
                }

                let update_cols = all_columns
                    .iter()
                    .filter(|c| !load_entity.identifying_attributes.contains_key(**c) && !load_entity.identifying_foreign_keys.contains(&c.to_string()))
                    .map(|c| format!("\"{c}\" = EXCLUDED.\"{c}\""))
                    .collect::<Vec<_>>()
                    .join(", ");

                // The temp table stages every value as TEXT so the literal
                // row-by-row INSERT above never needs per-value formatting;
                // casting back to the declared type only happens here, in
                // the SELECT that feeds the real table, since Postgres does
                // not implicitly cast text to uuid/int8/float8/boolean/
                // timestamptz/jsonb in an INSERT ... SELECT.
                let target_cols = all_columns.iter().map(|c| format!("\"{c}\"")).collect::<Vec<_>>().join(", ");
                let select_cols = all_columns
                    .iter()
                    .map(|c| format!("\"{c}\"{}", load_entity.column_type(c).map(|t| t.sql_cast()).unwrap_or("::text")))
                    .collect::<Vec<_>>()
                    .join(", ");

                let upsert = if update_cols.is_empty() {
                    format!(
                        "INSERT INTO {fulltable} ({pk}, {target_cols}) SELECT pk, {select_cols} FROM {temp_table} ON CONFLICT ({pk}) DO NOTHING",
                        fulltable = fulltable,
                        pk = load_entity.primary_key_name,
                        temp_table = temp_table
                    )
                } else {
                    format!(
                        "INSERT INTO {fulltable} ({pk}, {target_cols}) SELECT pk, {select_cols} FROM {temp_table} ON CONFLICT ({pk}) DO UPDATE SET {update_cols}",
                        fulltable = fulltable,
                        pk = load_entity.primary_key_name,
                        temp_table = temp_table,
                        update_cols = update_cols
                    )
                };
                diesel::sql_query(upsert).execute(conn)?;
                debug!("flushed {} row(s) into {fulltable}", rows.len());
                Ok(())
            })
        })
    }
}

fn build_raw_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    if min_size > max_size {
        return Err(PersistenceError::Unknown("min_connections must be <= max_connections".to_string()));
    }
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    r2d2::Pool::builder()
        .min_idle(Some(min_size))
        .max_size(max_size)
        .build(manager)
        .map_err(|e| PersistenceError::TransientIo(format!("pool build error: {e}")))
}

/// Builds the meta-table pool and brings its schema up to date. Use this
/// for the connection that owns `run`/`gen_run`/`repeats`/`row_errors`.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let pool = build_raw_pool(database_url, min_size, max_size)?;
    let mut conn = pool.get().map_err(|e| PersistenceError::TransientIo(format!("pool checkout error: {e}")))?;
    run_pending_migrations(&mut conn)?;
    Ok(pool)
}

/// Builds the pool used to write `Load` rows into caller-declared tables.
/// Deliberately skips the meta-table migration check: a `META_DATABASE_URL`
/// pointed at a separate instance should not have DBgen's bookkeeping
/// schema created on its Load-target database.
pub fn build_data_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    build_raw_pool(database_url, min_size, max_size)
}

pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    let config = crate::config::DbConfig::from_env();
    build_pool(&config.url, config.min_connections, config.max_connections)
}
