//! Exercises `flush_load_batch` against a real Postgres connection for an
//! entity whose columns are not all `TEXT` — the case the hand-written
//! upsert SQL has to cast correctly (uuid/int/float/bool foreign keys and
//! attributes), against a live database.

use std::collections::BTreeMap;

use diesel::connection::SimpleConnection;
use diesel::RunQueryDsl;
use serde_json::json;
use uuid::Uuid;

use dbgen_entity::entity::{EntityBuilder, ForeignKeySpec};
use dbgen_entity::field::{FieldSpec, FieldType};
use dbgen_persistence::pg::{build_dev_pool_from_env, MetaStore, PoolProvider};

fn skip_if_no_database() -> bool {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set - skipping load batch test");
        return true;
    }
    false
}

#[test]
fn flush_load_batch_casts_every_column_type() {
    if skip_if_no_database() {
        return;
    }

    let pool = build_dev_pool_from_env().expect("build pool");
    let mut conn = pool.get().expect("checkout connection");
    conn.batch_execute(
        "DROP TABLE IF EXISTS public.widget_parent, public.widget_measurement CASCADE;
         CREATE TABLE public.widget_parent (id UUID PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE public.widget_measurement (
             id UUID PRIMARY KEY,
             parent_id UUID NOT NULL,
             reading FLOAT8 NOT NULL,
             sample_count INT8 NOT NULL,
             verified BOOLEAN NOT NULL,
             label TEXT NOT NULL
         );",
    )
    .expect("create fixture tables");
    drop(conn);

    dbgen_entity::clear_registry();
    let parent = EntityBuilder::new("widget_parent").field("name", FieldSpec::new(FieldType::Text)).identifying(["name"]).build().unwrap();
    dbgen_entity::declare_entity(parent.clone()).unwrap();

    let measurement = EntityBuilder::new("widget_measurement")
        .foreign_key(ForeignKeySpec { column: "parent_id".into(), target_entity: "widget_parent".into(), target_schema: "public".into() })
        .field("reading", FieldSpec::new(FieldType::Float))
        .field("sample_count", FieldSpec::new(FieldType::Int))
        .field("verified", FieldSpec::new(FieldType::Bool))
        .field("label", FieldSpec::new(FieldType::Text))
        .identifying(["parent_id", "label"])
        .build()
        .unwrap();
    dbgen_entity::clear_registry();

    let load_entity = measurement.load_entity().unwrap();
    let store = MetaStore::new(PoolProvider { pool: pool.clone() }, PoolProvider { pool: pool.clone() });

    let parent_pk = Uuid::new_v4();
    let mut row = BTreeMap::new();
    row.insert("parent_id".to_string(), json!(parent_pk.to_string()));
    row.insert("reading".to_string(), json!(12.5));
    row.insert("sample_count".to_string(), json!(7));
    row.insert("verified".to_string(), json!(true));
    row.insert("label".to_string(), json!("batch-1"));

    let mut parent_conn = pool.get().expect("connection");
    diesel::sql_query(format!("INSERT INTO public.widget_parent (id, name) VALUES ('{parent_pk}', 'p1')")).execute(&mut parent_conn).expect("seed parent");

    let row_pk = Uuid::new_v4();
    store.flush_load_batch(&load_entity, &[(row_pk, row)]).expect("flush load batch");

    #[derive(diesel::QueryableByName, Debug)]
    struct Loaded {
        #[diesel(sql_type = diesel::sql_types::Int8)]
        sample_count: i64,
        #[diesel(sql_type = diesel::sql_types::Bool)]
        verified: bool,
        #[diesel(sql_type = diesel::sql_types::Double)]
        reading: f64,
    }

    let loaded: Vec<Loaded> = diesel::sql_query(format!(
        "SELECT sample_count, verified, reading FROM public.widget_measurement WHERE id = '{row_pk}'"
    ))
    .load(&mut parent_conn)
    .expect("select loaded row");

    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].sample_count, 7);
    assert!(loaded[0].verified);
    assert!((loaded[0].reading - 12.5).abs() < f64::EPSILON);

    parent_conn.batch_execute("DROP TABLE IF EXISTS public.widget_measurement, public.widget_parent CASCADE;").ok();
}
