//! Hashing & canonical serialization (§2 "Hashing & serialization").
//!
//! Every stable identity in this crate — node hash, generator hash, row
//! primary key, generator fingerprint — is `hash_str`/`hash_value` applied
//! to a `to_canonical_json` encoding. Nothing hashes a Rust value directly.

pub mod canonical_json;
pub mod hash;

pub use canonical_json::to_canonical_json;
pub use hash::{hash_str, hash_to_uuid, hash_value};
