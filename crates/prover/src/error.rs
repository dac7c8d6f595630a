use std::path::PathBuf;

use thiserror::Error;

use crate::config::ProverKind;

/// Errors from prover interaction.
#[derive(Debug, Error)]
pub enum ProverError {
    /// Prover binary not found at the specified path.
    #[error("{0} binary not found at: {path}", path = .1.display())]
    NotFound(ProverKind, PathBuf),
    /// Process failed to start.
    #[error("failed to start prover: {0}")]
    Spawn(String),
    /// Reading from or writing to the prover failed.
    #[error("prover I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The prover process is gone.
    #[error("prover process exited{}", exit_suffix(.0))]
    Exited(Option<i32>),
    /// The prover answered with something that is not a verdict.
    #[error("unexpected prover output: {0}")]
    Malformed(String),
    /// An operation was attempted before `start_prover`.
    #[error("prover session not started")]
    NotStarted,
    /// An earlier operation failed; the session must be reinitialized.
    #[error("prover session failed; reinitialize before further use")]
    SessionFailed,
    /// `pop` without a matching `push`.
    #[error("pop at base scope")]
    ScopeUnderflow,
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with status {code}"),
        None => String::new(),
    }
}

impl ProverError {
    /// Whether the session should be considered dead after this error.
    pub fn is_fatal_to_session(&self) -> bool {
        !matches!(self, ProverError::ScopeUnderflow | ProverError::NotStarted)
    }
}
