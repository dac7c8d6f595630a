//! The verification pipeline.
//!
//! [`VcPipeline::process`] prepares a program: every routine gets its loop
//! havocs, its calls replaced by callee contracts, and its own contract
//! inlined; the program's axioms go to the prover as global axioms.
//! [`VcPipeline::verify`] then checks one prepared routine.

use std::sync::Arc;
use std::time::Instant;

use ivl_vc_analysis::encode::ExprEncoder;
use ivl_vc_analysis::ir::{Program, Routine};
use ivl_vc_analysis::{
    PredicateTransformer, SymbolTable, TypeInfo, cut_back_edges, desugar_calls,
    desugar_specification, insert_loop_havocs,
};
use ivl_vc_prover::{BackendFactory, ProverSession, SessionState, SimplifyFactory, StubFactory};
use ivl_vc_terms::{AxiomBag, Term, TermBuilder, collect_axioms};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::PipelineError;

/// Outcome of verifying one routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The VC is valid.
    Ok,
    /// The prover could not prove the VC.
    Nok,
    /// The prover failed while checking the VC.
    Unknown,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Ok => write!(f, "OK"),
            Verdict::Nok => write!(f, "NOK"),
            Verdict::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Verdict and timing of one routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineReport {
    pub name: String,
    pub verdict: Verdict,
    pub duration_ms: u64,
    pub location: Option<String>,
}

/// Verdicts of a whole program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub routines: Vec<RoutineReport>,
    /// Whether any verdict came from the stub prover.
    pub degraded: bool,
}

impl RunReport {
    pub fn count(&self, verdict: Verdict) -> usize {
        self.routines.iter().filter(|r| r.verdict == verdict).count()
    }

    /// Whether every routine verified.
    pub fn all_ok(&self) -> bool {
        self.routines.iter().all(|r| r.verdict == Verdict::Ok)
    }
}

/// Prepare every routine of `program` for verification.
///
/// This is the prover-independent half of [`VcPipeline::process`]; any
/// structural error in any routine rejects the whole program.
pub fn prepare_program(program: &Program) -> Result<Program, PipelineError> {
    let symbols = SymbolTable::from_program(program);
    let routines = program
        .routines
        .iter()
        .map(|routine| prepare_routine(&symbols, routine))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Program {
        routines,
        ..program.clone()
    })
}

fn prepare_routine(symbols: &SymbolTable, routine: &Routine) -> Result<Routine, PipelineError> {
    let scope = symbols.scope(routine);
    let graph = scope.flow_graph(&routine.body)?;
    let havocked = insert_loop_havocs(&routine.body, &graph, &scope)?;
    let body = desugar_calls(&havocked.body, &scope)?;
    let desugared = Routine {
        body,
        ..routine.clone()
    };
    let prepared = match symbols.signature_of(&routine.name) {
        Some(sig) => desugar_specification(&desugared, sig)?,
        None => desugared,
    };
    tracing::info!(
        routine = %routine.name,
        commands = prepared.body.len(),
        loop_havocs = havocked.inserted,
        unreachable = havocked.unreachable.len(),
        "prepared routine"
    );
    Ok(prepared)
}

/// Encode the program's axioms, each preceded by the operator axioms its
/// encoding depends on.
pub fn encode_global_axioms(
    program: &Program,
    builder: &TermBuilder,
) -> Result<Vec<Term>, PipelineError> {
    let symbols = SymbolTable::from_program(program);
    let mut encoder = ExprEncoder::new(builder, &symbols);
    let mut bag = AxiomBag::new();
    for axiom in &program.axioms {
        let term = encoder.formula(axiom)?;
        bag.collect_from(&term);
        bag.insert(term);
    }
    Ok(bag.into_vec())
}

/// Routine-by-routine verifier owning one prover session.
#[derive(Debug)]
pub struct VcPipeline {
    config: PipelineConfig,
    builder: Arc<TermBuilder>,
    session: ProverSession,
    symbols: SymbolTable,
}

impl VcPipeline {
    /// Build the pipeline and start its prover.
    ///
    /// Never fails: without a usable prover the pipeline runs degraded.
    pub fn initialize(config: PipelineConfig) -> Self {
        let builder = Arc::new(TermBuilder::with_standard_axioms());
        let factory: Box<dyn BackendFactory> = match &config.prover {
            Some(prover) => Box::new(SimplifyFactory::new(prover.clone(), Arc::clone(&builder))),
            None => Box::new(StubFactory),
        };
        Self::with_factory(config, builder, factory)
    }

    /// Build the pipeline over a custom backend factory.
    pub fn with_factory(
        config: PipelineConfig,
        builder: Arc<TermBuilder>,
        factory: Box<dyn BackendFactory>,
    ) -> Self {
        let mut session = ProverSession::from_boxed(factory);
        session.start_prover();
        if session.is_degraded() {
            tracing::warn!("no prover available; all verdicts are unchecked");
        }
        Self {
            config,
            builder,
            session,
            symbols: SymbolTable::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn session(&self) -> &ProverSession {
        &self.session
    }

    pub fn is_degraded(&self) -> bool {
        self.session.is_degraded()
    }

    /// Prepare `program` and make its axioms the session's global axioms.
    ///
    /// Returns the program with every routine prepared for [`verify`].
    ///
    /// [`verify`]: Self::verify
    pub fn process(&mut self, program: &Program) -> Result<Program, PipelineError> {
        let prepared = prepare_program(program)?;
        self.install_program(program)?;
        Ok(prepared)
    }

    /// Load `program`'s declarations and global axioms without preparing
    /// its routines.
    pub fn install_program(&mut self, program: &Program) -> Result<(), PipelineError> {
        let axioms = encode_global_axioms(program, &self.builder)?;
        self.symbols = SymbolTable::from_program(program);

        if self.session.state() == SessionState::Failed {
            self.session.reinitialize();
        }
        if self.session.clear_global_axioms().is_err() {
            self.session.reinitialize();
        }
        let sent = axioms
            .iter()
            .try_for_each(|axiom| self.session.assume(axiom.clone()));
        if let Err(e) = sent {
            tracing::warn!(error = %e, axioms = axioms.len(), "cannot send global axioms; continuing without them");
            // The failed session only forgets them locally.
            if let Err(e) = self.session.clear_global_axioms() {
                tracing::debug!(error = %e, "dropping global axioms of a failed session");
            }
            self.session.reinitialize();
        }
        tracing::debug!(
            axioms = self.session.global_axioms().len(),
            "installed global axioms"
        );
        Ok(())
    }

    /// Verify one routine returned by [`process`](Self::process).
    pub fn verify(&mut self, routine: &Routine) -> Result<Verdict, PipelineError> {
        let scope = self.symbols.scope(routine);
        let graph = scope.flow_graph(&routine.body)?;
        let cut = cut_back_edges(&graph);
        let vc = PredicateTransformer::new(&self.builder, self.config.method)
            .with_assume_asserts(self.config.assume_asserts)
            .vc(&routine.name, &routine.body, &cut.graph, &scope)?;
        let axioms = collect_axioms(&vc);
        tracing::debug!(
            routine = %routine.name,
            back_edges = cut.back_edges.len(),
            axioms = axioms.len(),
            "checking vc"
        );

        if self.session.state() == SessionState::Failed {
            self.session.reinitialize();
        }
        let outcome = self.session.with_scope(|s| {
            for axiom in axioms.iter() {
                s.assume(axiom.clone())?;
            }
            s.is_valid(&vc)
        });

        let verdict = match outcome {
            Ok(true) => Verdict::Ok,
            Ok(false) => Verdict::Nok,
            Err(e) => {
                tracing::warn!(routine = %routine.name, error = %e, "prover failed; verdict unknown");
                self.session.reinitialize();
                Verdict::Unknown
            }
        };
        tracing::info!(routine = %routine.name, %verdict, "verified routine");
        Ok(verdict)
    }

    /// [`verify`](Self::verify) with timing.
    pub fn report(&mut self, routine: &Routine) -> Result<RoutineReport, PipelineError> {
        let start = Instant::now();
        let verdict = self.verify(routine)?;
        Ok(RoutineReport {
            name: routine.name.clone(),
            verdict,
            duration_ms: start.elapsed().as_millis() as u64,
            location: routine.location.clone(),
        })
    }

    /// Process `program` and verify all of its routines in order.
    pub fn run(&mut self, program: &Program) -> Result<RunReport, PipelineError> {
        let prepared = self.process(program)?;
        let routines = prepared
            .routines
            .iter()
            .map(|routine| self.report(routine))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RunReport {
            routines,
            degraded: self.is_degraded(),
        })
    }

    /// Stop the prover. The pipeline can not be used afterwards.
    pub fn terminate(&mut self) {
        self.session.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ivl_vc_analysis::ir::{Body, Command, Expr, Procedure, Type, VarDecl};

    fn program() -> Program {
        Program {
            globals: vec![VarDecl::new("x", Type::Int)],
            axioms: vec![Expr::le(Expr::int(0), Expr::var("x"))],
            procedures: vec![Procedure {
                name: "bump".into(),
                modifies: vec![vec!["x".into()]],
                ensures: vec![Expr::lt(Expr::int(0), Expr::var("x"))],
                ..Default::default()
            }],
            routines: vec![Routine {
                name: "bump".into(),
                body: Body::new(vec![Command::assign(
                    "x",
                    Expr::add(Expr::var("x"), Expr::int(1)),
                )]),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn prepare_inlines_own_contract() {
        let prepared = prepare_program(&program()).unwrap();
        let lines: Vec<String> = prepared.routines[0]
            .body
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(lines, vec!["x := (x + 1);", "$$exit: assert (0 < x);"]);
    }

    #[test]
    fn global_axioms_are_encoded() {
        let builder = TermBuilder::with_standard_axioms();
        let axioms = encode_global_axioms(&program(), &builder).unwrap();
        let printed: Vec<String> = axioms.iter().map(|a| a.to_string()).collect();
        assert_eq!(printed, vec!["(<= 0 term$$x)"]);
    }

    #[test]
    fn stub_pipeline_is_degraded_and_says_ok() {
        let mut pipeline = VcPipeline::initialize(PipelineConfig::default());
        assert!(pipeline.is_degraded());
        let report = pipeline.run(&program()).unwrap();
        assert!(report.degraded);
        assert_eq!(report.count(Verdict::Ok), 1);
        assert_eq!(pipeline.session().global_axioms().len(), 1);
        assert_eq!(pipeline.session().depth(), 0);
        pipeline.terminate();
    }

    #[test]
    fn processing_twice_replaces_global_axioms() {
        let mut pipeline = VcPipeline::initialize(PipelineConfig::default());
        pipeline.process(&program()).unwrap();
        pipeline.process(&program()).unwrap();
        assert_eq!(pipeline.session().global_axioms().len(), 1);
    }

    #[test]
    fn verdict_display() {
        assert_eq!(Verdict::Ok.to_string(), "OK");
        assert_eq!(Verdict::Nok.to_string(), "NOK");
        assert_eq!(Verdict::Unknown.to_string(), "UNKNOWN");
    }
}
