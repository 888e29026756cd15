//! Metadata persistence for DBgen (§4.6): the `run`/`gen_run`/`repeats`/
//! `row_errors` tables, and the bulk-load path for `Load` batches.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod runtime_adapter;
pub mod schema;

pub use config::DbConfig;
pub use error::{is_retryable, PersistenceError};
pub use pg::{build_data_pool, build_dev_pool_from_env, build_pool, ConnectionProvider, MetaStore, PgPool, PoolProvider, RunRow};
pub use runtime_adapter::RuntimeAdapter;
