//! Argument wiring: a node input is either a reference to another node's
//! output or an inline constant (§2 "Argument wiring").

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NodeInput {
    /// References the output named `name` of the node whose content hash
    /// is `source_hash`.
    Arg { source_hash: String, name: String },
    /// An inline value, independent of any other node.
    Const(Value),
}

impl NodeInput {
    pub fn arg(source_hash: impl Into<String>, name: impl Into<String>) -> Self {
        NodeInput::Arg { source_hash: source_hash.into(), name: name.into() }
    }

    pub fn source_hash(&self) -> Option<&str> {
        match self {
            NodeInput::Arg { source_hash, .. } => Some(source_hash),
            NodeInput::Const(_) => None,
        }
    }
}
