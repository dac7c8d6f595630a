//! # ivl-vc-prover
//!
//! Client for an external theorem prover speaking the Simplify protocol.
//!
//! The prover runs as a persistent child process. A [`ProverSession`] keeps
//! track of the assumptions it has been sent, organized in scopes, and can
//! replace a crashed process with a fresh one that receives the global
//! axioms again.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use ivl_vc_prover::{ProverConfig, ProverSession, SimplifyFactory};
//! use ivl_vc_terms::{Sort, TermBuilder};
//!
//! let builder = Arc::new(TermBuilder::with_standard_axioms());
//! let config = ProverConfig::auto_detect().unwrap();
//! let mut session = ProverSession::new(SimplifyFactory::new(config, builder.clone()));
//! session.start_prover();
//!
//! let x = builder.var("term$$x", Sort::Int);
//! let goal = builder.implies(
//!     builder.lt(builder.int(0), x.clone()),
//!     builder.le(builder.int(0), x),
//! );
//! let valid = session.with_scope(|s| s.is_valid(&goal)).unwrap();
//! println!("valid: {valid}");
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod process;
pub mod session;

pub use backend::{
    BackendFactory, ProverBackend, SimplifyFactory, SimplifyProver, StubFactory, YesProver,
};
pub use config::{ProverConfig, ProverKind};
pub use error::ProverError;
pub use session::{ProverSession, ScopeStats, SessionState};
