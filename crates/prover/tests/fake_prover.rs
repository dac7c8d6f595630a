//! Integration tests for the process client and session recovery.
//!
//! A small shell script stands in for the prover: it logs every line it
//! receives, answers queries containing `FALSE` with `Invalid.`, and exits
//! when a query mentions `CRASH`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ivl_vc_prover::{
    ProverConfig, ProverError, ProverKind, ProverSession, SessionState, SimplifyFactory,
};
use ivl_vc_terms::{Sort, Term, TermBuilder};
use tempfile::TempDir;

const SCRIPT: &str = r#"
log="$1"
n=0
while IFS= read -r line; do
  printf '%s\n' "$line" >> "$log"
  case "$line" in
    "(BG_PUSH"*) ;;
    "(BG_POP)") ;;
    *CRASH*) exit 3 ;;
    *BAD*) echo "Bad input: $line" ;;
    *FALSE*) n=$((n+1)); echo "Counterexample:"; echo "  labels: ()"; echo "$n: Invalid." ;;
    *) n=$((n+1)); echo "$n: Valid." ;;
  esac
done
"#;

// ---- Helpers ----

struct Fixture {
    _dir: TempDir,
    log: PathBuf,
    config: ProverConfig,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = dir.path().join("fake-simplify.sh");
    std::fs::write(&script, SCRIPT).expect("write script");
    let log = dir.path().join("traffic.log");
    let config = ProverConfig::new(ProverKind::Simplify, PathBuf::from("/bin/sh")).with_extra_args(
        vec![
            script.to_string_lossy().into_owned(),
            log.to_string_lossy().into_owned(),
        ],
    );
    Fixture {
        _dir: dir,
        log,
        config,
    }
}

fn traffic(log: &Path) -> Vec<String> {
    std::fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn started_session(fx: &Fixture, builder: &Arc<TermBuilder>) -> ProverSession {
    let mut session = ProverSession::new(SimplifyFactory::new(fx.config.clone(), builder.clone()));
    session.start_prover();
    assert_eq!(session.state(), SessionState::Started);
    assert!(!session.is_degraded());
    session
}

// ============================================================
// Queries
// ============================================================

#[test]
fn valid_and_invalid_verdicts() {
    let fx = fixture();
    let b = Arc::new(TermBuilder::new());
    let mut s = started_session(&fx, &b);

    assert!(s.is_valid(&b.formula(true)).unwrap());
    assert!(!s.is_valid(&b.formula(false)).unwrap());
    assert!(s.is_valid(&b.var("p", Sort::Formula)).unwrap());
}

#[test]
fn scoped_assumptions_are_pushed_and_popped() {
    let fx = fixture();
    let b = Arc::new(TermBuilder::new());
    let mut s = started_session(&fx, &b);

    let x = b.var("term$$x", Sort::Int);
    s.with_scope(|s| {
        s.assume(b.lt(b.int(0), x.clone()))?;
        s.is_valid(&b.le(b.int(0), x.clone()))
    })
    .unwrap();
    // A final query flushes the log: the script handles lines in order.
    s.is_valid(&b.formula(true)).unwrap();

    assert_eq!(
        traffic(&fx.log),
        vec![
            "(BG_PUSH (< 0 term$$x))",
            "(<= 0 term$$x)",
            "(BG_POP)",
            "TRUE",
        ]
    );
}

#[test]
fn shared_query_sends_definitions_first() {
    let fx = fixture();
    let b = Arc::new(TermBuilder::new());
    let mut s = started_session(&fx, &b);

    let sum = b.app("f", Sort::Int, vec![b.var("term$$x", Sort::Int)]);
    let goal = b.le(sum.clone(), sum);
    assert!(s.is_valid(&goal).unwrap());
    s.is_valid(&b.formula(true)).unwrap();

    let lines = traffic(&fx.log);
    assert_eq!(lines[0], "(BG_PUSH (EQ share$$0 (f term$$x)))");
    assert_eq!(lines[1], "(<= share$$0 share$$0)");
    assert_eq!(lines[2], "(BG_POP)");
}

#[test]
fn malformed_output_fails_the_session() {
    let fx = fixture();
    let b = Arc::new(TermBuilder::new());
    let mut s = started_session(&fx, &b);

    let err = s.is_valid(&b.var("BAD", Sort::Formula)).unwrap_err();
    assert!(matches!(err, ProverError::Malformed(_)));
    assert_eq!(s.state(), SessionState::Failed);
}

// ============================================================
// Crash recovery
// ============================================================

#[test]
fn crash_mid_query_recovers_with_global_axioms() {
    let fx = fixture();
    let b = Arc::new(TermBuilder::new());
    let mut s = started_session(&fx, &b);

    let axiom = b.lt(b.int(0), b.app("one", Sort::Int, vec![]));
    s.assume(axiom).unwrap();

    let outcome = s.with_scope(|s| {
        s.assume(b.var("local", Sort::Formula))?;
        s.is_valid(&b.var("CRASH", Sort::Formula))
    });
    assert!(outcome.is_err());
    assert_eq!(s.state(), SessionState::Failed);
    assert_eq!(s.depth(), 0);
    assert_eq!(s.stats().pushes, s.stats().pops);

    s.reinitialize();
    assert_eq!(s.state(), SessionState::Started);
    assert!(!s.is_degraded());
    assert!(s.is_valid(&b.formula(true)).unwrap());

    let lines = traffic(&fx.log);
    let pushes: Vec<&String> = lines.iter().filter(|l| l.contains("(< 0 one)")).collect();
    assert_eq!(pushes.len(), 2, "global axiom resent after restart: {lines:?}");
    assert_eq!(lines.last().map(String::as_str), Some("TRUE"));
}

#[test]
fn missing_binary_degrades_to_stub() {
    let b = Arc::new(TermBuilder::new());
    let config = ProverConfig::new(ProverKind::Simplify, PathBuf::from("/nonexistent/simplify"));
    let mut s = ProverSession::new(SimplifyFactory::new(config, b.clone()));
    s.start_prover();
    assert!(s.is_degraded());
    assert!(s.is_valid(&Term::formula(false)).unwrap());
}
