//! Declaration-time and dependency-time error taxonomy (§7).
//!
//! These are the "abort the process" / "abort the run" classes; row-scoped
//! failures live in [`crate::node::NodeError`] since they carry per-row
//! attribution instead.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error(
        "generator '{generator}': node {node_hash} looks for input '{input_name}' on a node \
         with hash {source_hash} that is not in the graph. {hint}"
    )]
    MissingNode {
        generator: String,
        node_hash: String,
        source_hash: String,
        input_name: String,
        hint: String,
    },

    #[error("generator '{generator}': computational graph has a cycle among {nodes:?}")]
    Cycle { generator: String, nodes: Vec<String> },

    #[error("generator '{generator}': only one Extract may be attached, already have {existing}")]
    MultipleExtracts { generator: String, existing: String },

    #[error(
        "generator names must match ^[\\w.-]+$, no spaces allowed. Offending name: '{name}'"
    )]
    InvalidGeneratorName { name: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("cross-generator dependency graph has a cycle among {generators:?}")]
    DependencyCycle { generators: Vec<String> },

    #[error("unknown generator name '{name}' in include/exclude/start/until filter")]
    UnknownGeneratorName { name: String },
}
