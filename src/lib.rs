//! Node wiring for the DHT resolver core: CLI configuration and the
//! `NodeState` that implements the command protocol's operational
//! surface by combining the announcement registry, the forwarding loop
//! and a DHT collaborator (spec.md §5, §6).

pub mod config;
pub mod node;
