//! elm-bench library crate.
//!
//! The primary interface is the `elm-bench` binary. The pipeline stages are
//! exposed here so integration tests can drive them with a substitute
//! toolchain.

pub mod config;
pub mod error;
pub mod harness;
pub mod isolate;
pub mod manifest;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod telemetry;
pub mod toolchain;
pub mod workspace;
