use ivl_vc_analysis::{DesugarError, FlowGraphError, VcError};
use thiserror::Error;

/// Errors that stop processing of a whole program.
///
/// Prover failures are not among them: they are recovered from inside the
/// pipeline and reported as an `UNKNOWN` verdict.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed flow graph: {0}")]
    FlowGraph(#[from] FlowGraphError),
    #[error("cannot desugar: {0}")]
    Desugar(#[from] DesugarError),
    #[error("cannot generate VC: {0}")]
    Vc(#[from] VcError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("cannot read program: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed program: {0}")]
    Json(#[from] serde_json::Error),
}
