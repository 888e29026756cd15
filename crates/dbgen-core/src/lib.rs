//! dbgen-core: the computational graph, dependency algebra and scheduler
//! that sit between the entity registry (`dbgen-entity`) and the runtime
//! executor (`dbgen-runtime`).
//!
//! Modules:
//! - `hashing`: canonical JSON and BLAKE3 content hashing, the basis for
//!   every stable identity in the system.
//! - `model`: `Node` (`Extract`/`Transform`/`Load`) and `NodeInput`
//!   (`Arg`/`Const`), the uniform computational-node contract.
//! - `graph`: per-generator DAG assembly, validation and topological sort.
//! - `dependency`: `Dependency`, the four-set data-footprint summary and
//!   its merge algebra.
//! - `generator`: `Generator`, one Extract plus transforms/loads/tags.
//! - `scheduler`: the cross-generator DAG and include/exclude/start/until
//!   filtering.
//! - `errors`: declaration- and dependency-time error taxonomy.

pub mod dependency;
pub mod errors;
pub mod generator;
pub mod graph;
pub mod hashing;
pub mod model;
pub mod scheduler;

pub use dependency::Dependency;
pub use errors::{GraphError, SchedulerError};
pub use generator::Generator;
pub use graph::GeneratorGraph;
pub use model::{ExtractSpec, LoadInvocation, LoadSpec, Namespace, Node, NodeError, NodeInput, NodeKind, TransformSpec};
pub use scheduler::{plan, ExecutionPlan, GeneratorSummary, PlanEntry};
