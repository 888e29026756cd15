//! Embedded-migration runner for the meta-tables.
//!
//! §4.6 "Schema evolution": presence is checked at run start; if missing,
//! this fails unless `nuke` is requested, in which case the caller should
//! run [`nuke_meta_tables`] before [`run_pending_migrations`].

use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::PersistenceError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub fn run_pending_migrations(conn: &mut PgConnection) -> Result<(), PersistenceError> {
    conn.batch_execute("CREATE EXTENSION IF NOT EXISTS pgcrypto;").ok();
    conn.run_pending_migrations(MIGRATIONS).map(|_| ()).map_err(|e| PersistenceError::Unknown(format!("migration error: {e}")))
}

pub fn meta_tables_present(conn: &mut PgConnection) -> Result<bool, PersistenceError> {
    use diesel::prelude::*;
    let exists: bool = diesel::select(diesel::dsl::sql::<diesel::sql_types::Bool>(
        "EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = 'run')",
    ))
    .get_result(conn)
    .map_err(PersistenceError::from)?;
    Ok(exists)
}

/// Drops and recreates the meta-tables, for `nuke = true` runs (§4.6).
pub fn nuke_meta_tables(conn: &mut PgConnection) -> Result<(), PersistenceError> {
    conn.batch_execute("DROP TABLE IF EXISTS row_errors, repeats, gen_run, run CASCADE;")
        .map_err(|e| PersistenceError::Unknown(format!("nuke error: {e}")))?;
    run_pending_migrations(conn)
}
