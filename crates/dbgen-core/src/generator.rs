//! `Generator`: one Extract, an unordered bag of Transforms and Loads, tags,
//! and a rolled-up `Dependency` (§3, §4.3, §4.4).

use crate::dependency::Dependency;
use crate::errors::GraphError;
use crate::graph::GeneratorGraph;
use crate::hashing::hash_value;
use crate::model::{Node, NodeKind};

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '-')
}

#[derive(Debug)]
pub struct Generator {
    pub name: String,
    pub description: String,
    pub extract: Node,
    pub extract_is_default: bool,
    pub transforms: Vec<Node>,
    pub loads: Vec<Node>,
    pub tags: Vec<String>,
    pub batch_size: Option<usize>,
    pub additional_dependencies: Option<Dependency>,
}

impl Generator {
    pub fn new(name: impl Into<String>, extract: Node) -> Result<Self, GraphError> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(GraphError::InvalidGeneratorName { name });
        }
        Ok(Self {
            name,
            description: "<no description>".to_string(),
            extract,
            extract_is_default: true,
            transforms: Vec::new(),
            loads: Vec::new(),
            tags: Vec::new(),
            batch_size: None,
            additional_dependencies: None,
        })
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn additional_dependencies(mut self, dep: Dependency) -> Self {
        self.additional_dependencies = Some(dep);
        self
    }

    /// Attaches a node, dispatching on its kind. Only one `Extract` may
    /// ever be attached — replacing the implicit default extract is fine,
    /// but attaching a second *explicit* one is a `MultipleExtracts` error
    /// (mirrors `Generator.add_node` in the source).
    pub fn add_node(mut self, node: Node) -> Result<Self, GraphError> {
        match node.kind() {
            NodeKind::Extract => {
                if self.extract_is_default {
                    self.extract = node;
                    self.extract_is_default = false;
                } else {
                    return Err(GraphError::MultipleExtracts {
                        generator: self.name.clone(),
                        existing: self.extract.hash().to_string(),
                    });
                }
            }
            NodeKind::Transform => self.transforms.push(node),
            NodeKind::Load => self.loads.push(node),
        }
        Ok(self)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Stable identity for this generator's definition, used to seed a
    /// row's `input_hash` (§4.5 step 3a) so the same record hashes
    /// differently under two distinct generators.
    pub fn hash(&self) -> String {
        let node_hashes: Vec<&str> = self.sorted_nodes().map(|nodes| nodes.iter().map(|n| n.hash()).collect()).unwrap_or_default();
        hash_value(&serde_json::json!({ "name": self.name, "nodes": node_hashes }))
    }

    /// Validates the computational graph and returns it topologically
    /// sorted, Extract first (§4.3). Re-validates on every call rather
    /// than memoizing, since `dbgen-core` nodes are immutable once built —
    /// unlike the source, there is no post-hoc `add_node` to invalidate a
    /// cache against.
    pub fn sorted_nodes(&self) -> Result<Vec<&Node>, GraphError> {
        let graph = GeneratorGraph::build(&self.name, &self.extract, &self.transforms, &self.loads, self.extract_is_default)?;
        graph.sorted_nodes()
    }

    /// Rolls up every node's `Dependency` contribution plus any
    /// user-declared `additional_dependencies` into a single value
    /// (§4.4). Only `Load` nodes contribute directly today; `Extract`
    /// contributions must be supplied via `additional_dependencies` until
    /// query-parsing is implemented (§9 open question scope).
    pub fn dependency(&self) -> Dependency {
        let mut dep = self.additional_dependencies.clone().unwrap_or_default();
        for node in &self.loads {
            if let Node::Load(load) = node {
                dep = dep.merge(&Dependency::from_load(&load.load_entity));
            }
        }
        dep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExtractSpec;

    fn default_extract() -> Node {
        Node::Extract(ExtractSpec::new("default_extract", || std::iter::empty()))
    }

    #[test]
    fn rejects_invalid_names() {
        let err = Generator::new("bad name!", default_extract()).unwrap_err();
        assert!(matches!(err, GraphError::InvalidGeneratorName { .. }));
    }

    #[test]
    fn accepts_dots_dashes_underscores() {
        assert!(Generator::new("load.widgets-v2_final", default_extract()).is_ok());
    }

    #[test]
    fn hash_is_stable_across_calls() {
        let gen = Generator::new("g", default_extract()).unwrap();
        assert_eq!(gen.hash(), gen.hash());
    }

    #[test]
    fn second_explicit_extract_is_rejected() {
        let gen = Generator::new("g", default_extract()).unwrap();
        let explicit = Node::Extract(ExtractSpec::new("explicit", || std::iter::empty()));
        let gen = gen.add_node(explicit).unwrap();
        let second = Node::Extract(ExtractSpec::new("second", || std::iter::empty()));
        assert!(matches!(gen.add_node(second), Err(GraphError::MultipleExtracts { .. })));
    }
}
