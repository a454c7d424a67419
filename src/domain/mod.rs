//! Domain layer types and invariants.

pub mod regions;
