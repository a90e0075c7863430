//! # meshtrace-runner
//!
//! File formats and commands behind the `meshtrace` binary.
//!
//! - [`input`]: CSV node lists, JSON packet lists, YAML configuration
//! - [`output`]: JSON reconstruction reports
//! - [`commands`]: the `reconstruct` and `synth` commands

pub mod commands;
mod error;
pub mod input;
pub mod output;

pub use commands::{reconstruct, synth, ReconstructArgs, SynthArgs};
pub use error::RunnerError;
