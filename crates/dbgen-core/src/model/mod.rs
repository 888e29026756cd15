//! Argument wiring and the three computational node kinds (§4.2).

pub mod arg;
pub mod node;

pub use arg::NodeInput;
pub use node::{ExtractSpec, LoadInvocation, LoadSpec, Namespace, Node, NodeError, NodeKind, TransformSpec};
