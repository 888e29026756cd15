//! `Dependency`: a generator's data footprint, four sets merged by union
//! (§3, §4.4).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use dbgen_entity::LoadEntity;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dependency {
    pub tables_yielded: BTreeSet<String>,
    pub tables_needed: BTreeSet<String>,
    pub columns_yielded: BTreeSet<String>,
    pub columns_needed: BTreeSet<String>,
}

impl Dependency {
    pub fn merge(mut self, other: &Dependency) -> Self {
        self.tables_yielded.extend(other.tables_yielded.iter().cloned());
        self.tables_needed.extend(other.tables_needed.iter().cloned());
        self.columns_yielded.extend(other.columns_yielded.iter().cloned());
        self.columns_needed.extend(other.columns_needed.iter().cloned());
        self
    }

    /// What a `Load` node contributes: the table it writes plus one
    /// `table.column` entry per identifying attribute/FK (§3).
    pub fn from_load(load_entity: &LoadEntity) -> Self {
        let table = load_entity.fulltablename();
        let mut columns_yielded = BTreeSet::new();
        for name in load_entity.identifying_attributes.keys() {
            columns_yielded.insert(format!("{table}.{name}"));
        }
        for name in &load_entity.identifying_foreign_keys {
            columns_yielded.insert(format!("{table}.{name}"));
        }
        Dependency { tables_yielded: [table].into_iter().collect(), tables_needed: BTreeSet::new(), columns_yielded, columns_needed: BTreeSet::new() }
    }

    /// What a query-backed `Extract` contributes, when the caller has
    /// parsed (or been told) which tables/columns it reads. Best-effort —
    /// §3 notes this is parsed from the query or supplemented manually via
    /// `additional_dependencies`.
    pub fn from_query_tables(tables: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Dependency {
            tables_needed: tables.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables_yielded.is_empty()
            && self.tables_needed.is_empty()
            && self.columns_yielded.is_empty()
            && self.columns_needed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_set_union() {
        let a = Dependency { tables_yielded: ["t1".into()].into_iter().collect(), ..Default::default() };
        let b = Dependency { tables_needed: ["t2".into()].into_iter().collect(), ..Default::default() };
        let merged = a.merge(&b);
        assert!(merged.tables_yielded.contains("t1"));
        assert!(merged.tables_needed.contains("t2"));
    }

    #[test]
    fn adding_a_load_only_grows_dependency() {
        let le = dbgen_entity::LoadEntity {
            name: "widget".into(),
            schema: "public".into(),
            primary_key_name: "id".into(),
            identifying_attributes: {
                let mut m = indexmap::IndexMap::new();
                m.insert("label".into(), dbgen_entity::FieldType::Text);
                m
            },
            identifying_foreign_keys: vec![],
            attributes: {
                let mut m = indexmap::IndexMap::new();
                m.insert("label".into(), dbgen_entity::FieldType::Text);
                m
            },
            foreign_keys: vec![],
        };
        let before = Dependency::default();
        let after = before.clone().merge(&Dependency::from_load(&le));
        assert!(before.tables_yielded.is_subset(&after.tables_yielded));
        assert!(before.columns_yielded.is_subset(&after.columns_yielded));
        assert!(after.tables_yielded.len() > before.tables_yielded.len());
    }
}
