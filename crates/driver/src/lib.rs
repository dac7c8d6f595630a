//! ivl-vc-driver: runs the verification pipeline over whole programs.
//!
//! [`pipeline::VcPipeline`] drives one prover session through every routine
//! of a program. [`parallel`] spreads routines over several sessions, and
//! [`cli`] is the `ivl-vc` binary's front end.

pub mod cli;
pub mod config;
pub mod error;
pub mod json_output;
pub mod output;
pub mod parallel;
pub mod pipeline;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use parallel::verify_parallel;
pub use pipeline::{
    RoutineReport, RunReport, VcPipeline, Verdict, encode_global_axioms, prepare_program,
};
