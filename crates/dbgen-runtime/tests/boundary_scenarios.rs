//! Integration coverage for the boundary scenarios named in §8: empty
//! extract, repeat suppression, identifying-FK propagation, row-level
//! failure isolation, cross-generator skip and filter slicing.

use std::collections::BTreeMap;

use serde_json::json;
use uuid::Uuid;

use dbgen_core::hashing::hash_to_uuid;
use dbgen_core::{Generator, LoadSpec, NodeInput};
use dbgen_core::{ExtractSpec, Node, TransformSpec};
use dbgen_entity::field::{FieldSpec, FieldType};
use dbgen_entity::entity::{EntityBuilder, ForeignKeySpec};
use dbgen_runtime::backend::in_memory::InMemoryMetaBackend;
use dbgen_runtime::executor::{run_generator, GeneratorStatus};
use dbgen_runtime::model::{Model, RunFilters, RunFlags};

fn widget_generator(rows: Vec<&'static str>) -> Generator {
    let entity = EntityBuilder::new("widget").field("label", FieldSpec::new(FieldType::Text)).identifying(["label"]).build().unwrap();
    let load_entity = entity.load_entity().unwrap();

    let extract = Node::Extract(ExtractSpec::new("widget_extract", move || {
        rows.clone().into_iter().map(|label| {
            let mut row = BTreeMap::new();
            row.insert("label".to_string(), json!(label));
            row
        })
    }));

    let mut inputs = indexmap::IndexMap::new();
    inputs.insert("label".to_string(), NodeInput::arg("widget_extract", "label"));
    let load = Node::Load(LoadSpec::new("widget_load", load_entity, inputs));

    Generator::new("widgets", extract).unwrap().add_node(load).unwrap()
}

#[test]
fn empty_extract_completes_with_zero_inputs() {
    let generator = widget_generator(vec![]);
    let backend = InMemoryMetaBackend::new();
    let run_id = Uuid::from_u128(1);
    let report = run_generator(&generator, run_id, &backend, vec![], false, false).unwrap();
    assert_eq!(report.status, GeneratorStatus::Completed);
    assert_eq!(report.n_inputs, 0);
    assert_eq!(backend.repeat_count(), 0);
}

#[test]
fn repeat_suppression_skips_rows_already_processed() {
    let generator = widget_generator(vec!["a", "b", "a"]);
    let backend = InMemoryMetaBackend::new();
    let run_id = Uuid::from_u128(2);

    let records = |labels: &[&str]| -> Vec<BTreeMap<String, serde_json::Value>> {
        labels
            .iter()
            .map(|l| {
                let mut row = BTreeMap::new();
                row.insert("label".to_string(), json!(l));
                row
            })
            .collect()
    };

    let first = run_generator(&generator, run_id, &backend, records(&["a", "b", "a"]), false, false).unwrap();
    assert_eq!(first.status, GeneratorStatus::Completed);
    assert_eq!(backend.repeat_count(), 2);

    let second = run_generator(&generator, run_id, &backend, records(&["a", "b", "a"]), false, false).unwrap();
    assert_eq!(second.status, GeneratorStatus::Completed);
    assert_eq!(second.n_skipped, 3);
    assert_eq!(backend.repeat_count(), 2);
}

#[test]
fn identifying_fk_propagates_into_child_primary_key() {
    dbgen_entity::clear_registry();
    let parent_entity = EntityBuilder::new("parent").field("name", FieldSpec::new(FieldType::Text)).identifying(["name"]).build().unwrap();
    let parent_load_entity = parent_entity.load_entity().unwrap();
    dbgen_entity::declare_entity(parent_entity.clone()).unwrap();

    let child_entity = EntityBuilder::new("child")
        .field("name", FieldSpec::new(FieldType::Text))
        .foreign_key(ForeignKeySpec { column: "parent".to_string(), target_entity: "parent".to_string(), target_schema: "public".to_string() })
        .identifying(["name", "parent"])
        .build()
        .unwrap();
    let child_load_entity = child_entity.load_entity().unwrap();
    dbgen_entity::clear_registry();

    let extract = Node::Extract(ExtractSpec::new("pc_extract", || {
        std::iter::once({
            let mut row = BTreeMap::new();
            row.insert("child_name".to_string(), json!("c"));
            row
        })
    }));

    let mut parent_inputs = indexmap::IndexMap::new();
    parent_inputs.insert("name".to_string(), NodeInput::Const(json!("p")));
    let parent_load = Node::Load(LoadSpec::new("load_parent", parent_load_entity, parent_inputs));

    let mut child_inputs = indexmap::IndexMap::new();
    child_inputs.insert("name".to_string(), NodeInput::arg("pc_extract", "child_name"));
    child_inputs.insert("parent".to_string(), NodeInput::arg("load_parent", "out"));
    let child_load = Node::Load(LoadSpec::new("load_child", child_load_entity, child_inputs));

    let generator = Generator::new("parent_child", extract).unwrap().add_node(parent_load).unwrap().add_node(child_load).unwrap();

    let backend = InMemoryMetaBackend::new();
    let run_id = Uuid::from_u128(3);
    let mut record = BTreeMap::new();
    record.insert("child_name".to_string(), json!("c"));

    let report = run_generator(&generator, run_id, &backend, vec![record.clone()], false, false).unwrap();
    assert_eq!(report.status, GeneratorStatus::Completed);

    let parent_pk = hash_to_uuid("parent", &json!({"name": "p"}));
    let child_pk = hash_to_uuid("child", &json!({"name": "c", "parent": parent_pk.to_string()}));

    let loaded_children = backend.loaded_rows("public.child");
    assert_eq!(loaded_children.len(), 1);
    assert_eq!(loaded_children[0].0, child_pk);

    // Rerunning with the same input mutates nothing new.
    let second = run_generator(&generator, run_id, &backend, vec![record], false, false).unwrap();
    assert_eq!(second.n_skipped, 1);
    assert_eq!(backend.loaded_rows("public.child").len(), 1);
}

#[test]
fn row_level_failure_is_isolated() {
    let entity = EntityBuilder::new("widget").field("label", FieldSpec::new(FieldType::Text)).identifying(["label"]).build().unwrap();
    let load_entity = entity.load_entity().unwrap();

    let extract = Node::Extract(ExtractSpec::new("w_extract", || {
        vec!["ok-1", "bad", "ok-2"].into_iter().map(|label| {
            let mut row = BTreeMap::new();
            row.insert("value".to_string(), json!(label));
            row
        })
    }));

    let mut transform_inputs = indexmap::IndexMap::new();
    transform_inputs.insert("value".to_string(), NodeInput::arg("w_extract", "value"));
    let transform = Node::Transform(TransformSpec::new("checked", transform_inputs, vec!["value".to_string()], |inputs| {
        let value = inputs.get("value").and_then(|v| v.as_str()).unwrap_or_default();
        if value == "bad" {
            Err("external failure on this row".to_string())
        } else {
            let mut out = BTreeMap::new();
            out.insert("value".to_string(), json!(value));
            Ok(out)
        }
    }));

    let mut load_inputs = indexmap::IndexMap::new();
    load_inputs.insert("label".to_string(), NodeInput::arg("checked", "value"));
    let load = Node::Load(LoadSpec::new("w_load", load_entity, load_inputs));

    let generator = Generator::new("widgets", extract).unwrap().add_node(transform).unwrap().add_node(load).unwrap();

    let backend = InMemoryMetaBackend::new();
    let run_id = Uuid::from_u128(4);
    let records = vec!["ok-1", "bad", "ok-2"]
        .into_iter()
        .map(|v| {
            let mut row = BTreeMap::new();
            row.insert("value".to_string(), json!(v));
            row
        })
        .collect();

    let report = run_generator(&generator, run_id, &backend, records, false, false).unwrap();
    assert_eq!(report.status, GeneratorStatus::Completed);
    assert_eq!(report.n_errors, 1);
    assert_eq!(backend.row_error_count(), 1);
    assert_eq!(backend.repeat_count(), 2);
    assert_eq!(backend.loaded_rows("public.widget").len(), 2);
}

#[test]
fn cross_generator_skip_leaves_independent_generator_running() {
    // g1 fails (its only transform always raises a fatal, non-external
    // error by referencing a non-existent node); g2 depends on g1's table
    // and must be skipped; g3 is independent and still completes.
    let widget = EntityBuilder::new("widget").field("label", FieldSpec::new(FieldType::Text)).identifying(["label"]).build().unwrap();
    let widget_load_entity = widget.load_entity().unwrap();
    let other = EntityBuilder::new("other").field("label", FieldSpec::new(FieldType::Text)).identifying(["label"]).build().unwrap();
    let other_load_entity = other.load_entity().unwrap();

    let g1_extract = Node::Extract(ExtractSpec::new("g1_extract", || {
        std::iter::once({
            let mut row = BTreeMap::new();
            // Deliberately omits "label" — the load node references it by
            // name below, which the graph validator cannot catch (it only
            // checks that the *node* exists, not its output names), so
            // this surfaces as a fatal `UnresolvedInput` at row time.
            row.insert("unrelated".to_string(), json!("x"));
            row
        })
    }));
    let mut g1_inputs = indexmap::IndexMap::new();
    g1_inputs.insert("label".to_string(), NodeInput::arg("g1_extract", "label"));
    let g1_load = Node::Load(LoadSpec::new("g1_load", widget_load_entity, g1_inputs));
    let g1 = Generator::new("g1", g1_extract).unwrap().add_node(g1_load).unwrap();

    let g2_extract = Node::Extract(ExtractSpec::new("g2_extract", || std::iter::empty()));
    let mut g2_inputs = indexmap::IndexMap::new();
    g2_inputs.insert("label".to_string(), NodeInput::Const(json!("unused")));
    let g2_load = Node::Load(LoadSpec::new("g2_load", other_load_entity, g2_inputs));
    let g2 = Generator::new("g2", g2_extract)
        .unwrap()
        .add_node(g2_load)
        .unwrap()
        .additional_dependencies(dbgen_core::Dependency::from_query_tables(vec!["public.widget".to_string()]));

    let g3_extract = Node::Extract(ExtractSpec::new("g3_extract", || std::iter::empty()));
    let mut g3_inputs = indexmap::IndexMap::new();
    g3_inputs.insert("label".to_string(), NodeInput::Const(json!("unused")));
    let third_entity = EntityBuilder::new("third").field("label", FieldSpec::new(FieldType::Text)).identifying(["label"]).build().unwrap();
    let g3_load = Node::Load(LoadSpec::new("g3_load", third_entity.load_entity().unwrap(), g3_inputs));
    let g3 = Generator::new("g3", g3_extract).unwrap().add_node(g3_load).unwrap();

    let mut model = Model::new();
    model.declare_generator(g1);
    model.declare_generator(g2);
    model.declare_generator(g3);

    let backend = InMemoryMetaBackend::new();
    let run_id = Uuid::from_u128(5);
    let report = model.run(&backend, run_id, RunFilters::default(), RunFlags::default()).unwrap();

    let status = |name: &str| report.generator_reports.iter().find(|r| r.name == name).unwrap().status;
    assert_eq!(status("g1"), GeneratorStatus::Failed);
    assert_eq!(status("g2"), GeneratorStatus::Skipped);
    assert_eq!(status("g3"), GeneratorStatus::Completed);
    assert_eq!(report.exit_code(), 1);
}
