//! Abstraction over prover backends.
//!
//! A backend is a single live prover: it accepts assumptions, retracts them
//! in LIFO order, and answers validity queries. The [`ProverSession`]
//! layers scopes, failure tracking, and restarts on top, and obtains new
//! backends through a [`BackendFactory`].
//!
//! [`ProverSession`]: crate::session::ProverSession

use std::sync::Arc;
use std::time::Instant;

use ivl_vc_terms::{Term, TermBuilder, eliminate_sharing};

use crate::config::ProverConfig;
use crate::error::ProverError;
use crate::process::SimplifyProcess;

/// Trait abstracting over prover backends.
pub trait ProverBackend: Send {
    /// Assume `term` until the matching [`retract`](Self::retract).
    fn assume(&mut self, term: &Term) -> Result<(), ProverError>;

    /// Retract the most recent assumption.
    fn retract(&mut self) -> Result<(), ProverError>;

    /// Whether `term` is valid under the current assumptions.
    fn is_valid(&mut self, term: &Term) -> Result<bool, ProverError>;

    /// Release the backend's resources. Must be idempotent.
    fn terminate(&mut self);

    /// Whether this backend answers without proving anything.
    fn is_stub(&self) -> bool {
        false
    }
}

/// Creates fresh backends for a session.
pub trait BackendFactory: Send {
    fn start(&self) -> Result<Box<dyn ProverBackend>, ProverError>;
}

impl<F> BackendFactory for F
where
    F: Fn() -> Result<Box<dyn ProverBackend>, ProverError> + Send,
{
    fn start(&self) -> Result<Box<dyn ProverBackend>, ProverError> {
        self()
    }
}

/// Backend talking to an external Simplify-compatible process.
///
/// Terms are unshared before they go on the wire: an assumption is sent as
/// one `BG_PUSH` of its definitions conjoined with the rewritten term, and a
/// query is bracketed by a `BG_PUSH`/`BG_POP` of its definitions.
#[derive(Debug)]
pub struct SimplifyProver {
    process: SimplifyProcess,
    builder: Arc<TermBuilder>,
}

impl SimplifyProver {
    pub fn start(config: &ProverConfig, builder: Arc<TermBuilder>) -> Result<Self, ProverError> {
        let process = SimplifyProcess::spawn(config)?;
        Ok(Self { process, builder })
    }
}

impl ProverBackend for SimplifyProver {
    fn assume(&mut self, term: &Term) -> Result<(), ProverError> {
        let out = eliminate_sharing(term, &self.builder);
        let mut parts = out.definitions;
        parts.push(out.term);
        let flat = self.builder.and(parts);
        self.process.send(&format!("(BG_PUSH {flat})"))
    }

    fn retract(&mut self) -> Result<(), ProverError> {
        self.process.send("(BG_POP)")
    }

    fn is_valid(&mut self, term: &Term) -> Result<bool, ProverError> {
        let out = eliminate_sharing(term, &self.builder);
        let has_definitions = !out.definitions.is_empty();
        let start = Instant::now();

        if has_definitions {
            let defs = self.builder.and(out.definitions);
            self.process.send(&format!("(BG_PUSH {defs})"))?;
        }
        let valid = self.process.query(&out.term.to_string())?;
        if has_definitions {
            self.process.send("(BG_POP)")?;
        }

        tracing::debug!(
            valid,
            prover_time_ms = start.elapsed().as_millis() as u64,
            query = self.process.query_count(),
            "prover query"
        );
        Ok(valid)
    }

    fn terminate(&mut self) {
        self.process.terminate();
    }
}

/// Stub backend that reports every query valid.
///
/// Used when no real prover can be started.
#[derive(Debug, Default, Clone, Copy)]
pub struct YesProver;

impl ProverBackend for YesProver {
    fn assume(&mut self, _term: &Term) -> Result<(), ProverError> {
        Ok(())
    }

    fn retract(&mut self) -> Result<(), ProverError> {
        Ok(())
    }

    fn is_valid(&mut self, _term: &Term) -> Result<bool, ProverError> {
        Ok(true)
    }

    fn terminate(&mut self) {}

    fn is_stub(&self) -> bool {
        true
    }
}

/// Starts [`SimplifyProver`]s for a fixed configuration.
#[derive(Debug, Clone)]
pub struct SimplifyFactory {
    config: ProverConfig,
    builder: Arc<TermBuilder>,
}

impl SimplifyFactory {
    pub fn new(config: ProverConfig, builder: Arc<TermBuilder>) -> Self {
        Self { config, builder }
    }

    pub fn config(&self) -> &ProverConfig {
        &self.config
    }
}

impl BackendFactory for SimplifyFactory {
    fn start(&self) -> Result<Box<dyn ProverBackend>, ProverError> {
        tracing::debug!("Using {} subprocess backend", self.config.kind);
        let prover = SimplifyProver::start(&self.config, Arc::clone(&self.builder))?;
        Ok(Box::new(prover))
    }
}

/// Factory for sessions that never had a prover configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubFactory;

impl BackendFactory for StubFactory {
    fn start(&self) -> Result<Box<dyn ProverBackend>, ProverError> {
        Ok(Box::new(YesProver))
    }
}
