//! End-to-end runs of the pipeline against a scripted prover.
//!
//! The scripted backend logs every call, answers "invalid" for any goal
//! mentioning FALSE, and can be told to crash on its next query.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ivl_vc_analysis::VcMethod;
use ivl_vc_analysis::ir::{Body, Command, Expr, Procedure, Program, Routine, Type, VarDecl};
use ivl_vc_driver::{PipelineConfig, cli, PipelineError, VcPipeline, Verdict};
use ivl_vc_prover::{ProverBackend, ProverError};
use ivl_vc_terms::{Term, TermBuilder};

type Log = Arc<Mutex<Vec<String>>>;

struct Scripted {
    log: Log,
    crash: Arc<AtomicBool>,
}

impl Scripted {
    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

impl ProverBackend for Scripted {
    fn assume(&mut self, term: &Term) -> Result<(), ProverError> {
        self.record(format!("assume {term}"));
        Ok(())
    }

    fn retract(&mut self) -> Result<(), ProverError> {
        self.record("retract".to_string());
        Ok(())
    }

    fn is_valid(&mut self, term: &Term) -> Result<bool, ProverError> {
        if self.crash.swap(false, Ordering::SeqCst) {
            self.record("crash".to_string());
            return Err(ProverError::Exited(None));
        }
        let text = term.to_string();
        self.record(format!("valid? {text}"));
        Ok(!text.contains("FALSE"))
    }

    fn terminate(&mut self) {
        self.record("terminate".to_string());
    }
}

struct Harness {
    log: Log,
    crash: Arc<AtomicBool>,
    pipeline: VcPipeline,
}

fn harness(config: PipelineConfig) -> Harness {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let crash = Arc::new(AtomicBool::new(false));
    let (factory_log, factory_crash) = (Arc::clone(&log), Arc::clone(&crash));
    let factory = move || -> Result<Box<dyn ProverBackend>, ProverError> {
        factory_log.lock().unwrap().push("start".to_string());
        Ok(Box::new(Scripted {
            log: Arc::clone(&factory_log),
            crash: Arc::clone(&factory_crash),
        }))
    };
    let pipeline = VcPipeline::with_factory(
        config,
        Arc::new(TermBuilder::with_standard_axioms()),
        Box::new(factory),
    );
    Harness {
        log,
        crash,
        pipeline,
    }
}

impl Harness {
    fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }
}

const GLOBAL_AXIOM: &str = "assume (<= 0 term$$x)";

fn routine(name: &str, commands: Vec<Command>) -> Routine {
    Routine {
        name: name.to_string(),
        body: Body::new(commands),
        ..Default::default()
    }
}

fn holds(name: &str) -> Routine {
    routine(
        name,
        vec![
            Command::assign("x", Expr::add(Expr::var("x"), Expr::int(1))),
            Command::assert(Expr::lt(Expr::int(0), Expr::var("x"))),
        ],
    )
}

fn fails(name: &str) -> Routine {
    routine(name, vec![Command::assert(Expr::Bool(false))])
}

fn program(routines: Vec<Routine>) -> Program {
    Program {
        globals: vec![
            VarDecl::new("x", Type::Int),
            VarDecl::new("m", Type::map(vec![Type::Int], Type::Bool)),
        ],
        axioms: vec![Expr::le(Expr::int(0), Expr::var("x"))],
        routines,
        ..Default::default()
    }
}

#[test]
fn valid_and_invalid_routines() {
    let mut h = harness(PipelineConfig::default());
    let report = h
        .pipeline
        .run(&program(vec![holds("inc"), fails("boom")]))
        .unwrap();

    assert!(!report.degraded);
    assert_eq!(report.routines[0].verdict, Verdict::Ok);
    assert_eq!(report.routines[1].verdict, Verdict::Nok);
    assert!(h.entries().contains(&"valid? FALSE".to_string()));
    assert_eq!(h.count(GLOBAL_AXIOM), 1);
}

#[test]
fn strongest_postcondition_agrees() {
    let mut h = harness(PipelineConfig::default().with_method(VcMethod::Sp));
    let report = h
        .pipeline
        .run(&program(vec![holds("inc"), fails("boom")]))
        .unwrap();
    let verdicts: Vec<Verdict> = report.routines.iter().map(|r| r.verdict).collect();
    assert_eq!(verdicts, vec![Verdict::Ok, Verdict::Nok]);
}

#[test]
fn crash_gives_unknown_and_the_next_routine_recovers() {
    let mut h = harness(PipelineConfig::default());
    let prepared = h
        .pipeline
        .process(&program(vec![holds("first"), holds("second")]))
        .unwrap();

    h.crash.store(true, Ordering::SeqCst);
    let first = h.pipeline.verify(&prepared.routines[0]).unwrap();
    let second = h.pipeline.verify(&prepared.routines[1]).unwrap();

    assert_eq!(first, Verdict::Unknown);
    assert_eq!(second, Verdict::Ok);
    assert_eq!(h.pipeline.session().stats().restarts, 1);
    assert_eq!(h.pipeline.session().depth(), 0);
    assert_eq!(h.count("start"), 2);
    assert_eq!(h.count("terminate"), 1);
    // The replacement prover learns the global axiom again before use.
    assert_eq!(h.count(GLOBAL_AXIOM), 2);
    let entries = h.entries();
    let restart = entries.iter().rposition(|e| e == "start").unwrap();
    assert_eq!(entries[restart + 1], GLOBAL_AXIOM);
}

#[test]
fn scopes_stay_balanced() {
    let mut h = harness(PipelineConfig::default());
    let selects = routine(
        "selects",
        vec![Command::assert(Expr::Select(
            Box::new(Expr::var("m")),
            vec![Expr::int(0)],
        ))],
    );
    let report = h
        .pipeline
        .run(&program(vec![holds("a"), selects, fails("c")]))
        .unwrap();
    assert_eq!(report.routines.len(), 3);

    let stats = h.pipeline.session().stats();
    assert_eq!(stats.pushes, 3);
    assert_eq!(stats.pops, 3);
    assert_eq!(h.pipeline.session().depth(), 0);

    // Every assumption made inside a routine's scope is retracted with it.
    let scoped = h
        .entries()
        .iter()
        .filter(|e| e.starts_with("assume ") && *e != GLOBAL_AXIOM)
        .count();
    assert!(scoped > 0);
    assert_eq!(h.count("retract"), scoped);
}

#[test]
fn callee_contract_is_used() {
    let mut h = harness(PipelineConfig::default());
    let mut prog = program(vec![routine(
        "caller",
        vec![
            Command::call("bump", vec![], vec![]),
            Command::assert(Expr::lt(Expr::int(0), Expr::var("x"))),
        ],
    )]);
    prog.procedures.push(Procedure {
        name: "bump".into(),
        modifies: vec![vec!["x".into()]],
        ensures: vec![Expr::lt(Expr::int(0), Expr::var("x"))],
        ..Default::default()
    });
    let report = h.pipeline.run(&prog).unwrap();
    assert_eq!(report.routines[0].verdict, Verdict::Ok);
}

#[test]
fn unknown_label_rejects_the_program() {
    let mut h = harness(PipelineConfig::default());
    let broken = routine("broken", vec![Command::goto(&["nowhere"])]);
    let err = h
        .pipeline
        .run(&program(vec![holds("fine"), broken]))
        .unwrap_err();
    assert!(matches!(err, PipelineError::FlowGraph(_)));
    assert!(!h.entries().iter().any(|e| e.starts_with("valid?")));
}

#[test]
fn unavailable_prover_degrades_to_ok() {
    let factory = || -> Result<Box<dyn ProverBackend>, ProverError> {
        Err(ProverError::Spawn("no prover here".to_string()))
    };
    let mut pipeline = VcPipeline::with_factory(
        PipelineConfig::default(),
        Arc::new(TermBuilder::with_standard_axioms()),
        Box::new(factory),
    );
    assert!(pipeline.is_degraded());
    let report = pipeline
        .run(&program(vec![holds("a"), fails("b")]))
        .unwrap();
    assert!(report.degraded);
    assert!(report.all_ok());
    assert_eq!(cli::exit_code(&report), cli::EXIT_NOT_VERIFIED);
}

struct RefusesAssumptions;

impl ProverBackend for RefusesAssumptions {
    fn assume(&mut self, _term: &Term) -> Result<(), ProverError> {
        Err(ProverError::Exited(None))
    }

    fn retract(&mut self) -> Result<(), ProverError> {
        Ok(())
    }

    fn is_valid(&mut self, _term: &Term) -> Result<bool, ProverError> {
        Ok(true)
    }

    fn terminate(&mut self) {}
}

#[test]
fn rejected_global_axioms_are_dropped() {
    let factory = || -> Result<Box<dyn ProverBackend>, ProverError> {
        Ok(Box::new(RefusesAssumptions))
    };
    let mut pipeline = VcPipeline::with_factory(
        PipelineConfig::default(),
        Arc::new(TermBuilder::with_standard_axioms()),
        Box::new(factory),
    );
    let report = pipeline.run(&program(vec![holds("a")])).unwrap();
    assert_eq!(report.routines.len(), 1);
    assert!(!report.degraded);
    assert!(pipeline.session().global_axioms().is_empty());
    assert_eq!(pipeline.session().depth(), 0);
}
