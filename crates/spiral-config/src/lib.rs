//! Shared runtime configuration for the SpiralDense crates.
//!
//! Settings are read once from the environment and cached for the lifetime of
//! the process. Hosts that embed the crates can install an explicit snapshot
//! with [`interop::configure`] before the first matrix is created.

pub mod interop;
pub mod tracing;

pub use interop::{AlreadyConfigured, InteropConfig, ParsePolicyError, StridePolicy};
