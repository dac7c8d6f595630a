/// Machine-readable verdicts for `--output-format json`.
use serde::{Deserialize, Serialize};

use crate::pipeline::{RunReport, Verdict};
use ivl_vc_analysis::VcMethod;

/// Complete run report in JSON form.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub file: String,
    pub method: VcMethod,
    /// True when no prover checked the verdicts.
    pub degraded: bool,
    pub routines: Vec<JsonRoutine>,
    pub summary: JsonSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRoutine {
    pub name: String,
    /// "ok", "nok" or "unknown"
    pub verdict: Verdict,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonSummary {
    pub total: usize,
    pub ok: usize,
    pub nok: usize,
    pub unknown: usize,
}

impl JsonReport {
    pub fn from_run(file: impl Into<String>, method: VcMethod, run: &RunReport) -> Self {
        Self {
            file: file.into(),
            method,
            degraded: run.degraded,
            routines: run
                .routines
                .iter()
                .map(|r| JsonRoutine {
                    name: r.name.clone(),
                    verdict: r.verdict,
                    duration_ms: r.duration_ms,
                    location: r.location.clone(),
                })
                .collect(),
            summary: JsonSummary {
                total: run.routines.len(),
                ok: run.count(Verdict::Ok),
                nok: run.count(Verdict::Nok),
                unknown: run.count(Verdict::Unknown),
            },
        }
    }
}

/// Print a JSON report to stdout. Everything else goes to stderr.
pub fn print_json_report(report: &JsonReport) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("[ivl-vc] Error serializing JSON report: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RoutineReport;

    fn run() -> RunReport {
        RunReport {
            routines: vec![
                RoutineReport {
                    name: "inc".into(),
                    verdict: Verdict::Ok,
                    duration_ms: 3,
                    location: Some("prog.json:1".into()),
                },
                RoutineReport {
                    name: "dec".into(),
                    verdict: Verdict::Nok,
                    duration_ms: 4,
                    location: None,
                },
            ],
            degraded: false,
        }
    }

    #[test]
    fn summary_counts_verdicts() {
        let report = JsonReport::from_run("prog.json", VcMethod::Wp, &run());
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.ok, 1);
        assert_eq!(report.summary.nok, 1);
        assert_eq!(report.summary.unknown, 0);
    }

    #[test]
    fn serializes_lowercase_verdicts() {
        let report = JsonReport::from_run("prog.json", VcMethod::Sp, &run());
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["method"], "sp");
        assert_eq!(value["routines"][0]["verdict"], "ok");
        assert_eq!(value["routines"][1]["verdict"], "nok");
        assert_eq!(value["routines"][0]["location"], "prog.json:1");
        assert!(value["routines"][1].get("location").is_none());
    }

    #[test]
    fn round_trips_through_json() {
        let report = JsonReport::from_run("prog.json", VcMethod::Wp, &run());
        let json = serde_json::to_string(&report).unwrap();
        let back: JsonReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.routines[1].verdict, Verdict::Nok);
        assert_eq!(back.method, VcMethod::Wp);
    }
}
