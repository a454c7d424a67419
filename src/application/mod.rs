//! Application-level error types shared by the binary and HTTP surfaces.

pub mod error;
