//! Per-generator computational graph: assembly, validation, topological
//! sort (§4.3).
//!
//! Grounded directly on the source's `Generator._computational_graph` /
//! `_sort_graph` / `validate_nodes` and `utils.graphs.topsort_with_dict`: a
//! plain `BTreeMap<hash, node>` plus an edge list built from every `Arg`
//! input, sorted with a lexicographic (Kahn's-algorithm-with-a-sorted-ready-
//! set) topological sort so the order is stable across runs for the same
//! set of hashes, and Extract is always emitted first.

use std::collections::{BTreeMap, BTreeSet};

use crate::errors::GraphError;
use crate::model::{Node, NodeInput, NodeKind};

#[derive(Debug)]
pub struct GeneratorGraph<'a> {
    generator_name: String,
    nodes: BTreeMap<String, &'a Node>,
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl<'a> GeneratorGraph<'a> {
    /// Assembles the graph from `extract ∪ transforms ∪ loads`. Returns
    /// `MissingNode` eagerly if any `Arg` references a hash outside the
    /// node set, with hint text distinguishing a suspected missing load
    /// (name suffix `_id`), a missing extract (still the default), or a
    /// missing transform — mirroring the source's three-way hint logic.
    pub fn build(
        generator_name: &str,
        extract: &'a Node,
        transforms: &'a [Node],
        loads: &'a [Node],
        extract_is_default: bool,
    ) -> Result<Self, GraphError> {
        let mut nodes: BTreeMap<String, &Node> = BTreeMap::new();
        nodes.insert(extract.hash().to_string(), extract);
        for t in transforms {
            if nodes.insert(t.hash().to_string(), t).is_some() {
                // Same hash reused is allowed (content-addressed sharing);
                // nothing to validate here.
            }
        }
        for l in loads {
            nodes.insert(l.hash().to_string(), l);
        }

        let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (node_hash, node) in &nodes {
            edges.entry(node_hash.clone()).or_default();
            for (input_name, input) in node.inputs() {
                if let NodeInput::Arg { source_hash, name } = input {
                    if !nodes.contains_key(&source_hash) {
                        let hint = if input_name.ends_with("_id") {
                            format!(
                                "Arg name '{}' matches the pattern of a Load for entity '{}'. Are you missing a load?",
                                input_name,
                                &input_name[..input_name.len() - 3]
                            )
                        } else if extract_is_default {
                            "Generator is using the default extract; did you attach a query or extractor?".to_string()
                        } else {
                            "The arg details match a transform; did you add all transforms?".to_string()
                        };
                        return Err(GraphError::MissingNode {
                            generator: generator_name.to_string(),
                            node_hash: node_hash.clone(),
                            source_hash,
                            input_name: name.clone(),
                            hint,
                        });
                    }
                    edges.entry(source_hash).or_default().insert(node_hash.clone());
                }
            }
        }

        Ok(Self { generator_name: generator_name.to_string(), nodes, edges })
    }

    /// Lexicographic topological sort (Kahn's algorithm, ready set kept
    /// sorted) with Extract forced first regardless of tie-break, matching
    /// the source's `[self.extract, *sorted_nodes]` construction.
    pub fn sorted_nodes(&self) -> Result<Vec<&'a Node>, GraphError> {
        let mut indegree: BTreeMap<String, usize> = self.nodes.keys().map(|h| (h.clone(), 0)).collect();
        for targets in self.edges.values() {
            for t in targets {
                *indegree.entry(t.clone()).or_default() += 1;
            }
        }

        let mut ready: BTreeSet<String> =
            indegree.iter().filter(|(_, &deg)| deg == 0).map(|(h, _)| h.clone()).collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut remaining = indegree.clone();

        while let Some(hash) = ready.iter().next().cloned() {
            ready.remove(&hash);
            order.push(hash.clone());
            if let Some(targets) = self.edges.get(&hash) {
                for t in targets {
                    let deg = remaining.get_mut(t).expect("target present");
                    *deg -= 1;
                    if *deg == 0 {
                        ready.insert(t.clone());
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let cyclic: Vec<String> = remaining.into_iter().filter(|(_, deg)| *deg > 0).map(|(h, _)| h).collect();
            return Err(GraphError::Cycle { generator: self.generator_name.clone(), nodes: cyclic });
        }

        let extract_hash = self
            .nodes
            .iter()
            .find(|(_, n)| n.kind() == NodeKind::Extract)
            .map(|(h, _)| h.clone())
            .expect("exactly one extract validated at generator-build time");

        let mut result = Vec::with_capacity(order.len());
        result.push(self.nodes[&extract_hash]);
        for hash in order {
            if hash != extract_hash {
                result.push(self.nodes[&hash]);
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExtractSpec, TransformSpec};
    use indexmap::IndexMap;

    fn extract() -> Node {
        Node::Extract(ExtractSpec::new("ex1", || std::iter::empty()))
    }

    #[test]
    fn missing_node_reports_id_suffix_hint() {
        let ex = extract();
        let mut inputs = IndexMap::new();
        inputs.insert("parent_id".to_string(), NodeInput::arg("absent_hash", "out"));
        let t = Node::Transform(TransformSpec::new("t1", inputs, vec!["x".into()], |_| Ok(Default::default())));
        let transforms = vec![t];
        let err = GeneratorGraph::build("gen1", &ex, &transforms, &[], false).unwrap_err();
        match err {
            GraphError::MissingNode { hint, .. } => assert!(hint.contains("Load for entity 'parent'")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn sorts_extract_first_and_detects_cycles() {
        let ex = extract();
        let mut inputs_a = IndexMap::new();
        inputs_a.insert("x".to_string(), NodeInput::arg(ex.hash(), "row"));
        let a = Node::Transform(TransformSpec::new("a", inputs_a, vec!["y".into()], |_| Ok(Default::default())));
        let mut inputs_b = IndexMap::new();
        inputs_b.insert("x".to_string(), NodeInput::arg("a", "y"));
        let b = Node::Transform(TransformSpec::new("b", inputs_b, vec!["z".into()], |_| Ok(Default::default())));
        let transforms = vec![a, b];
        let graph = GeneratorGraph::build("gen1", &ex, &transforms, &[], false).unwrap();
        let order: Vec<&str> = graph.sorted_nodes().unwrap().into_iter().map(|n| n.hash()).collect();
        assert_eq!(order, vec!["ex1", "a", "b"]);
    }
}
