//! Stateful prover session with scopes and crash recovery.
//!
//! ```text
//! Uninitialized --start_prover--> Started --backend error--> Failed
//!                                    ^                          |
//!                                    +-------reinitialize-------+
//! ```
//!
//! The base scope holds global axioms. They survive every restart: a new
//! backend receives them again before it is used.

use std::fmt;

use ivl_vc_terms::Term;

use crate::backend::{BackendFactory, ProverBackend, YesProver};
use crate::error::ProverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Started,
    Failed,
}

/// Counters for scope bookkeeping.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScopeStats {
    pub pushes: u64,
    pub pops: u64,
    pub restarts: u64,
}

/// A prover plus the assumptions it has been told about.
pub struct ProverSession {
    factory: Box<dyn BackendFactory>,
    backend: Option<Box<dyn ProverBackend>>,
    state: SessionState,
    globals: Vec<Term>,
    scopes: Vec<Vec<Term>>,
    degraded: bool,
    stats: ScopeStats,
}

impl fmt::Debug for ProverSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProverSession")
            .field("state", &self.state)
            .field("globals", &self.globals.len())
            .field("depth", &self.scopes.len())
            .field("degraded", &self.degraded)
            .field("stats", &self.stats)
            .finish()
    }
}

impl ProverSession {
    pub fn new(factory: impl BackendFactory + 'static) -> Self {
        Self::from_boxed(Box::new(factory))
    }

    pub fn from_boxed(factory: Box<dyn BackendFactory>) -> Self {
        Self {
            factory,
            backend: None,
            state: SessionState::Uninitialized,
            globals: Vec::new(),
            scopes: Vec::new(),
            degraded: false,
            stats: ScopeStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether queries are being answered by the always-valid stub.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Number of open scopes above the base scope.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn global_axioms(&self) -> &[Term] {
        &self.globals
    }

    pub fn stats(&self) -> ScopeStats {
        self.stats
    }

    /// Start the backend. Never fails: if the prover cannot be started the
    /// session falls back to the stub and reports itself degraded.
    pub fn start_prover(&mut self) {
        if self.state == SessionState::Started {
            return;
        }
        self.launch();
    }

    /// Open a scope.
    pub fn push(&mut self) -> Result<(), ProverError> {
        self.live()?;
        self.scopes.push(Vec::new());
        self.stats.pushes += 1;
        Ok(())
    }

    /// Close the innermost scope, retracting its assumptions.
    ///
    /// On a failed session the scope is only unwound locally, so callers can
    /// keep push and pop balanced on their error paths.
    pub fn pop(&mut self) -> Result<(), ProverError> {
        let scope = self.scopes.pop().ok_or(ProverError::ScopeUnderflow)?;
        self.stats.pops += 1;
        if self.state != SessionState::Started {
            return Ok(());
        }
        let outcome = match self.backend.as_mut() {
            Some(backend) => scope.iter().try_for_each(|_| backend.retract()),
            None => Ok(()),
        };
        self.track(outcome)
    }

    /// Assume `term` until the current scope is popped. At base depth the
    /// term becomes a global axiom.
    pub fn assume(&mut self, term: Term) -> Result<(), ProverError> {
        let outcome = self.live()?.assume(&term);
        self.track(outcome)?;
        match self.scopes.last_mut() {
            Some(scope) => scope.push(term),
            None => self.globals.push(term),
        }
        Ok(())
    }

    pub fn is_valid(&mut self, term: &Term) -> Result<bool, ProverError> {
        let outcome = self.live()?.is_valid(term);
        self.track(outcome)
    }

    /// Run `f` inside a fresh scope. Every scope opened since entry is
    /// closed again, whether `f` succeeds or not.
    pub fn with_scope<R, F>(&mut self, f: F) -> Result<R, ProverError>
    where
        F: FnOnce(&mut Self) -> Result<R, ProverError>,
    {
        let depth = self.depth();
        self.push()?;
        let result = f(self);
        let mut closed = Ok(());
        while self.depth() > depth {
            if let Err(e) = self.pop() {
                closed = Err(e);
            }
        }
        let value = result?;
        closed.map(|()| value)
    }

    /// Retract and forget every global axiom.
    pub fn clear_global_axioms(&mut self) -> Result<(), ProverError> {
        if !self.scopes.is_empty() {
            return Err(ProverError::ScopeUnderflow);
        }
        let globals = std::mem::take(&mut self.globals);
        if self.state != SessionState::Started {
            return Ok(());
        }
        let outcome = match self.backend.as_mut() {
            Some(backend) => globals.iter().try_for_each(|_| backend.retract()),
            None => Ok(()),
        };
        self.track(outcome)
    }

    /// Replace the backend with a fresh one and resend the global axioms.
    pub fn reinitialize(&mut self) {
        tracing::warn!(
            globals = self.globals.len(),
            open_scopes = self.scopes.len(),
            "reinitializing prover session"
        );
        if let Some(mut backend) = self.backend.take() {
            backend.terminate();
        }
        self.scopes.clear();
        self.stats.restarts += 1;
        self.launch();
    }

    /// Stop the backend. Global axioms are kept for a later start.
    pub fn terminate(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.terminate();
        }
        self.scopes.clear();
        self.state = SessionState::Uninitialized;
    }

    fn launch(&mut self) {
        match self.factory.start() {
            Ok(mut backend) => {
                let resent = self.globals.iter().try_for_each(|ax| backend.assume(ax));
                match resent {
                    Ok(()) => {
                        self.degraded = backend.is_stub();
                        self.backend = Some(backend);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "prover rejected global axioms; falling back to stub prover");
                        backend.terminate();
                        self.fall_back();
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot start prover; every query will be reported valid");
                self.fall_back();
            }
        }
        self.state = SessionState::Started;
    }

    fn fall_back(&mut self) {
        self.backend = Some(Box::new(YesProver));
        self.degraded = true;
    }

    fn live(&mut self) -> Result<&mut (dyn ProverBackend + 'static), ProverError> {
        match self.state {
            SessionState::Uninitialized => Err(ProverError::NotStarted),
            SessionState::Failed => Err(ProverError::SessionFailed),
            SessionState::Started => self.backend.as_deref_mut().ok_or(ProverError::NotStarted),
        }
    }

    fn track<T>(&mut self, outcome: Result<T, ProverError>) -> Result<T, ProverError> {
        if let Err(e) = &outcome
            && e.is_fatal_to_session()
        {
            tracing::warn!(error = %e, "prover session failed");
            self.state = SessionState::Failed;
        }
        outcome
    }
}

impl Drop for ProverSession {
    fn drop(&mut self) {
        self.terminate();
    }
}
