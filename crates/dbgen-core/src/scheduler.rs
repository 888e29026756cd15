//! Cross-generator dependency analysis and scheduling (§4.4).
//!
//! An edge `A -> B` exists iff `A` yields a table/column that `B` needs.
//! The generator set is sorted lexicographically (tie-break by name) and
//! then sliced/filtered by `include`/`exclude`/`start`/`until`.

use std::collections::{BTreeMap, BTreeSet};

use crate::dependency::Dependency;
use crate::errors::SchedulerError;

#[derive(Debug, Clone)]
pub struct GeneratorSummary {
    pub name: String,
    pub dependency: Dependency,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanEntry {
    Run(String),
    Skip(String),
}

/// The outcome of `Scheduler::plan`: the full topological order (needed so
/// dependents of a skipped generator still know it ran-or-not) annotated
/// with which entries are actually executed vs. skipped.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub order: Vec<PlanEntry>,
}

impl ExecutionPlan {
    pub fn to_run(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter_map(|e| match e {
                PlanEntry::Run(name) => Some(name.as_str()),
                PlanEntry::Skip(_) => None,
            })
            .collect()
    }
}

fn edge_exists(a: &Dependency, b: &Dependency) -> bool {
    !a.tables_yielded.is_disjoint(&b.tables_needed) || !a.columns_yielded.is_disjoint(&b.columns_needed)
}

/// Topologically sorts `generators` (edges derived from `Dependency`
/// overlap), ties broken lexicographically by name, then applies
/// `include`/`exclude`/`start`/`until` filters. Excluded generators still
/// appear in `order` (as `Skip`) so the topology — and therefore what
/// still counts as "completed" for a dependent's purposes — is preserved,
/// per §4.4.
pub fn plan(
    generators: &[GeneratorSummary],
    include: &BTreeSet<String>,
    exclude: &BTreeSet<String>,
    start: Option<&str>,
    until: Option<&str>,
) -> Result<ExecutionPlan, SchedulerError> {
    let names: BTreeSet<&str> = generators.iter().map(|g| g.name.as_str()).collect();
    for name in include
        .iter()
        .map(|s| s.as_str())
        .chain(exclude.iter().map(|s| s.as_str()))
        .chain(start.iter().copied())
        .chain(until.iter().copied())
    {
        if !names.contains(name) {
            return Err(SchedulerError::UnknownGeneratorName { name: name.to_string() });
        }
    }

    let mut edges: BTreeMap<String, BTreeSet<String>> = generators.iter().map(|g| (g.name.clone(), BTreeSet::new())).collect();
    let mut indegree: BTreeMap<String, usize> = generators.iter().map(|g| (g.name.clone(), 0)).collect();
    for a in generators {
        for b in generators {
            if a.name != b.name && edge_exists(&a.dependency, &b.dependency) {
                if edges.get_mut(&a.name).unwrap().insert(b.name.clone()) {
                    *indegree.get_mut(&b.name).unwrap() += 1;
                }
            }
        }
    }

    let mut ready: BTreeSet<String> = indegree.iter().filter(|(_, &d)| d == 0).map(|(n, _)| n.clone()).collect();
    let mut remaining = indegree.clone();
    let mut sorted = Vec::with_capacity(generators.len());

    while let Some(name) = ready.iter().next().cloned() {
        ready.remove(&name);
        sorted.push(name.clone());
        for target in &edges[&name] {
            let deg = remaining.get_mut(target).unwrap();
            *deg -= 1;
            if *deg == 0 {
                ready.insert(target.clone());
            }
        }
    }

    if sorted.len() != generators.len() {
        let cyclic: Vec<String> = remaining.into_iter().filter(|(_, d)| *d > 0).map(|(n, _)| n).collect();
        return Err(SchedulerError::DependencyCycle { generators: cyclic });
    }

    let start_idx = start.map(|s| sorted.iter().position(|n| n == s).unwrap()).unwrap_or(0);
    let until_idx = until.map(|u| sorted.iter().position(|n| n == u).unwrap()).unwrap_or(sorted.len() - 1);

    let order = sorted
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let in_slice = idx >= start_idx && idx <= until_idx;
            let included = include.is_empty() || include.contains(&name);
            let excluded = exclude.contains(&name);
            if in_slice && included && !excluded {
                PlanEntry::Run(name)
            } else {
                PlanEntry::Skip(name)
            }
        })
        .collect();

    Ok(ExecutionPlan { order })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(yielded: &[&str], needed: &[&str]) -> Dependency {
        Dependency {
            tables_yielded: yielded.iter().map(|s| s.to_string()).collect(),
            tables_needed: needed.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn filter_slicing_runs_exactly_start_to_until() {
        let gens = vec![
            GeneratorSummary { name: "a".into(), dependency: dep(&["t_a"], &[]) },
            GeneratorSummary { name: "b".into(), dependency: dep(&["t_b"], &["t_a"]) },
            GeneratorSummary { name: "c".into(), dependency: dep(&["t_c"], &["t_b"]) },
            GeneratorSummary { name: "d".into(), dependency: dep(&[], &["t_c"]) },
        ];
        let plan = plan(&gens, &BTreeSet::new(), &BTreeSet::new(), Some("b"), Some("c")).unwrap();
        assert_eq!(plan.to_run(), vec!["b", "c"]);
    }

    #[test]
    fn cross_generator_cycle_is_rejected() {
        let gens = vec![
            GeneratorSummary { name: "a".into(), dependency: dep(&["t1"], &["t2"]) },
            GeneratorSummary { name: "b".into(), dependency: dep(&["t2"], &["t1"]) },
        ];
        let err = plan(&gens, &BTreeSet::new(), &BTreeSet::new(), None, None).unwrap_err();
        assert!(matches!(err, SchedulerError::DependencyCycle { .. }));
    }

    #[test]
    fn excluded_generator_still_occupies_topology() {
        let gens = vec![
            GeneratorSummary { name: "a".into(), dependency: dep(&["t1"], &[]) },
            GeneratorSummary { name: "b".into(), dependency: dep(&[], &["t1"]) },
        ];
        let mut exclude = BTreeSet::new();
        exclude.insert("a".to_string());
        let plan = plan(&gens, &BTreeSet::new(), &exclude, None, None).unwrap();
        assert_eq!(plan.order, vec![PlanEntry::Skip("a".into()), PlanEntry::Run("b".into())]);
    }
}
