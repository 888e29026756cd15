//! `ComputationalNode` and its three variants: Extract, Transform, Load
//! (§4.2). All three share a uniform identity contract (`hash`, `inputs`,
//! `outputs`); their `invoke` semantics differ, which is why they're
//! represented as an enum over distinct behaviors rather than one trait
//! object with a single `invoke` signature.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use dbgen_entity::LoadEntity;

use crate::hashing::{hash_to_uuid, hash_value};
use crate::model::arg::NodeInput;

/// `{node_hash -> {output_name -> value}}`, rebuilt fresh for every row.
pub type Namespace = std::collections::HashMap<String, BTreeMap<String, Value>>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    /// A referenced node/output was not found in the namespace at
    /// invocation time. Graph validation should make this unreachable in
    /// practice; kept as a defensive variant.
    #[error("node {node_hash}: input '{input_name}' not found in namespace (source {source_hash})")]
    UnresolvedInput { node_hash: String, input_name: String, source_hash: String },

    /// A user transform raised an error. This is the row-scoped,
    /// isolatable failure described in §7 ("Row errors (external)") — the
    /// executor catches this and continues with the next row.
    #[error("transform {node_hash} failed: {message}")]
    ExternalError { node_hash: String, message: String },

    /// A Load's identifying input was absent and no PK override was given.
    #[error("load {node_hash} ({entity}): missing identifying input '{field}'")]
    MissingIdentifier { node_hash: String, entity: String, field: String },

    /// A Load's input value doesn't match its column's declared type
    /// (§4.2 step 1: validate/coerce Load inputs against the declared
    /// column type).
    #[error("load {node_hash} ({entity}): field '{field}' does not match declared type {expected}")]
    TypeMismatch { node_hash: String, entity: String, field: String, expected: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Extract,
    Transform,
    Load,
}

fn resolve_inputs(
    node_hash: &str,
    inputs: &IndexMap<String, NodeInput>,
    namespace: &Namespace,
) -> Result<BTreeMap<String, Value>, NodeError> {
    let mut resolved = BTreeMap::new();
    for (key, input) in inputs {
        let value = match input {
            NodeInput::Const(v) => v.clone(),
            NodeInput::Arg { source_hash, name } => namespace
                .get(source_hash)
                .and_then(|outputs| outputs.get(name))
                .cloned()
                .ok_or_else(|| NodeError::UnresolvedInput {
                    node_hash: node_hash.to_string(),
                    input_name: name.clone(),
                    source_hash: source_hash.clone(),
                })?,
        };
        resolved.insert(key.clone(), value);
    }
    Ok(resolved)
}

/// A finite, restartable source of input records. `extract()` may be
/// called again and must reproduce the same sequence modulo source
/// mutation (§4.2).
pub struct ExtractSpec {
    pub hash: String,
    source: Box<dyn Fn() -> Box<dyn Iterator<Item = BTreeMap<String, Value>> + Send> + Send + Sync>,
    length: Option<usize>,
}

impl ExtractSpec {
    pub fn new<F, I>(hash: impl Into<String>, source: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: Iterator<Item = BTreeMap<String, Value>> + Send + 'static,
    {
        Self { hash: hash.into(), source: Box::new(move || Box::new(source())), length: None }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn extract(&self) -> Box<dyn Iterator<Item = BTreeMap<String, Value>> + Send> {
        (self.source)()
    }

    pub fn length(&self) -> Option<usize> {
        self.length
    }
}

impl std::fmt::Debug for ExtractSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractSpec").field("hash", &self.hash).finish()
    }
}

/// A pure function of named inputs to named outputs. Must not touch the
/// database; any error it raises is isolated per-row by the executor
/// (§4.2, §7).
pub struct TransformSpec {
    pub hash: String,
    pub inputs: IndexMap<String, NodeInput>,
    pub outputs: Vec<String>,
    func: Box<dyn Fn(&BTreeMap<String, Value>) -> Result<BTreeMap<String, Value>, String> + Send + Sync>,
}

impl TransformSpec {
    pub fn new<F>(
        hash: impl Into<String>,
        inputs: IndexMap<String, NodeInput>,
        outputs: Vec<String>,
        func: F,
    ) -> Self
    where
        F: Fn(&BTreeMap<String, Value>) -> Result<BTreeMap<String, Value>, String> + Send + Sync + 'static,
    {
        Self { hash: hash.into(), inputs, outputs, func: Box::new(func) }
    }

    pub fn invoke(&self, namespace: &Namespace) -> Result<BTreeMap<String, Value>, NodeError> {
        let resolved = resolve_inputs(&self.hash, &self.inputs, namespace)?;
        (self.func)(&resolved).map_err(|message| NodeError::ExternalError { node_hash: self.hash.clone(), message })
    }
}

impl std::fmt::Debug for TransformSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformSpec").field("hash", &self.hash).field("inputs", &self.inputs).finish()
    }
}

/// A row ready to be appended to a Load's batch buffer, as produced by
/// `LoadSpec::invoke`. The executor owns the actual buffer (§5) — the node
/// itself stays stateless and `Send + Sync`.
#[derive(Debug, Clone)]
pub struct LoadInvocation {
    pub pk: uuid::Uuid,
    pub row: BTreeMap<String, Value>,
}

/// Derives its own primary key from identifying inputs and emits a single
/// output `out` carrying that PK, usable as a foreign-key input elsewhere
/// (§4.2).
#[derive(Debug, Clone)]
pub struct LoadSpec {
    pub hash: String,
    pub load_entity: LoadEntity,
    pub inputs: IndexMap<String, NodeInput>,
}

const PK_OVERRIDE_KEY: &str = "__pk__";

impl LoadSpec {
    pub fn new(hash: impl Into<String>, load_entity: LoadEntity, inputs: IndexMap<String, NodeInput>) -> Self {
        Self { hash: hash.into(), load_entity, inputs }
    }

    pub fn outputs(&self) -> Vec<String> {
        vec!["out".to_string()]
    }

    pub fn invoke(&self, namespace: &Namespace) -> Result<LoadInvocation, NodeError> {
        let resolved = resolve_inputs(&self.hash, &self.inputs, namespace)?;

        for (name, value) in &resolved {
            if name == PK_OVERRIDE_KEY {
                continue;
            }
            if let Some(expected) = self.load_entity.column_type(name) {
                if !expected.accepts(value) {
                    return Err(NodeError::TypeMismatch {
                        node_hash: self.hash.clone(),
                        entity: self.load_entity.fulltablename(),
                        field: name.clone(),
                        expected: format!("{expected:?}"),
                    });
                }
            }
        }

        if let Some(pk_override) = resolved.get(PK_OVERRIDE_KEY) {
            if let Some(s) = pk_override.as_str() {
                if let Ok(pk) = uuid::Uuid::parse_str(s) {
                    let mut row = resolved.clone();
                    row.remove(PK_OVERRIDE_KEY);
                    return Ok(LoadInvocation { pk, row });
                }
            }
        }

        let mut identifying = BTreeMap::new();
        for name in self.load_entity.identifying_attributes.keys() {
            let value = resolved.get(name).cloned().ok_or_else(|| NodeError::MissingIdentifier {
                node_hash: self.hash.clone(),
                entity: self.load_entity.fulltablename(),
                field: name.clone(),
            })?;
            identifying.insert(name.clone(), value);
        }
        for name in &self.load_entity.identifying_foreign_keys {
            let value = resolved.get(name).cloned().ok_or_else(|| NodeError::MissingIdentifier {
                node_hash: self.hash.clone(),
                entity: self.load_entity.fulltablename(),
                field: name.clone(),
            })?;
            identifying.insert(name.clone(), value);
        }

        let canonical = serde_json::to_value(&identifying).expect("BTreeMap<String, Value> is always valid JSON");
        let pk = hash_to_uuid(&self.load_entity.name, &canonical);
        Ok(LoadInvocation { pk, row: resolved })
    }
}

/// The three node kinds, uniformly addressable by content hash.
#[derive(Debug)]
pub enum Node {
    Extract(ExtractSpec),
    Transform(TransformSpec),
    Load(LoadSpec),
}

impl Node {
    pub fn hash(&self) -> &str {
        match self {
            Node::Extract(e) => &e.hash,
            Node::Transform(t) => &t.hash,
            Node::Load(l) => &l.hash,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Extract(_) => NodeKind::Extract,
            Node::Transform(_) => NodeKind::Transform,
            Node::Load(_) => NodeKind::Load,
        }
    }

    pub fn inputs(&self) -> IndexMap<String, NodeInput> {
        match self {
            Node::Extract(_) => IndexMap::new(),
            Node::Transform(t) => t.inputs.clone(),
            Node::Load(l) => l.inputs.clone(),
        }
    }

    /// A content-stable hash for the node's own definition (its inputs and
    /// declared outputs), independent of any particular row — used to seed
    /// generator/fingerprint hashes, never for row identity.
    pub fn definition_hash(&self) -> String {
        let payload = serde_json::json!({
            "kind": format!("{:?}", self.kind()),
            "hash": self.hash(),
            "inputs": self.inputs(),
        });
        hash_value(&payload)
    }
}
