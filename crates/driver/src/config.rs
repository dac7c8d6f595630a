//! Pipeline configuration.
//!
//! Settings come from the environment and can be overridden on the command
//! line:
//!
//! | variable                | meaning                                   |
//! |-------------------------|-------------------------------------------|
//! | `IVL_VC_PROVER`         | prover command line, or `stub` for none   |
//! | `IVL_VC_TIMEOUT_MS`     | per-query timeout hint                    |
//! | `IVL_VC_METHOD`         | `wp` (default) or `sp`                    |
//! | `IVL_VC_ASSUME_ASSERTS` | `1`/`true` to assume checked assertions   |
//! | `IVL_VC_JOBS`           | number of parallel workers                |

use ivl_vc_analysis::VcMethod;
use ivl_vc_prover::ProverConfig;

use crate::error::PipelineError;

/// Configuration of a [`VcPipeline`](crate::pipeline::VcPipeline).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub method: VcMethod,
    pub assume_asserts: bool,
    /// `None` runs every query against the always-valid stub.
    pub prover: Option<ProverConfig>,
    /// Number of parallel workers, each with its own prover.
    pub jobs: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            method: VcMethod::Wp,
            assume_asserts: false,
            prover: None,
            jobs: 1,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: VcMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_assume_asserts(mut self, assume_asserts: bool) -> Self {
        self.assume_asserts = assume_asserts;
        self
    }

    pub fn with_prover(mut self, prover: Option<ProverConfig>) -> Self {
        self.prover = prover;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Read the configuration from the process environment.
    ///
    /// Without `IVL_VC_PROVER` the prover is auto-detected.
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        config.prover = match lookup("IVL_VC_PROVER") {
            Some(line) if is_stub(&line) => None,
            Some(line) => Some(ProverConfig::from_command_line(&line).ok_or_else(|| {
                PipelineError::Config("IVL_VC_PROVER is empty".to_string())
            })?),
            None => ProverConfig::auto_detect().ok(),
        };

        if let Some(raw) = lookup("IVL_VC_TIMEOUT_MS") {
            let timeout_ms: u64 = raw.trim().parse().map_err(|_| {
                PipelineError::Config(format!("IVL_VC_TIMEOUT_MS is not a number: {raw}"))
            })?;
            config.prover = config.prover.map(|p| p.with_timeout(timeout_ms));
        }

        if let Some(raw) = lookup("IVL_VC_METHOD") {
            config.method = raw.trim().parse().map_err(PipelineError::Config)?;
        }

        if let Some(raw) = lookup("IVL_VC_ASSUME_ASSERTS") {
            config.assume_asserts = parse_flag(&raw).ok_or_else(|| {
                PipelineError::Config(format!("IVL_VC_ASSUME_ASSERTS is not a boolean: {raw}"))
            })?;
        }

        if let Some(raw) = lookup("IVL_VC_JOBS") {
            let jobs: usize = raw.trim().parse().map_err(|_| {
                PipelineError::Config(format!("IVL_VC_JOBS is not a number: {raw}"))
            })?;
            config = config.with_jobs(jobs);
        }

        Ok(config)
    }
}

fn is_stub(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "stub" | "none")
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use ivl_vc_prover::ProverKind;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.method, VcMethod::Wp);
        assert!(!config.assume_asserts);
        assert!(config.prover.is_none());
        assert_eq!(config.jobs, 1);
    }

    #[test]
    fn stub_prover_from_env() {
        let config = PipelineConfig::from_lookup(lookup(&[("IVL_VC_PROVER", "stub")])).unwrap();
        assert!(config.prover.is_none());
    }

    #[test]
    fn prover_command_line_and_timeout() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("IVL_VC_PROVER", "/opt/z3/bin/z3 /si"),
            ("IVL_VC_TIMEOUT_MS", "2500"),
        ]))
        .unwrap();
        let prover = config.prover.unwrap();
        assert_eq!(prover.kind, ProverKind::Z3);
        assert_eq!(prover.prover_path, PathBuf::from("/opt/z3/bin/z3"));
        assert_eq!(prover.timeout_ms, 2500);
    }

    #[test]
    fn method_flags_and_jobs() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("IVL_VC_PROVER", "none"),
            ("IVL_VC_METHOD", "SP"),
            ("IVL_VC_ASSUME_ASSERTS", "yes"),
            ("IVL_VC_JOBS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.method, VcMethod::Sp);
        assert!(config.assume_asserts);
        assert_eq!(config.jobs, 1);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for vars in [
            [("IVL_VC_PROVER", "stub"), ("IVL_VC_METHOD", "bmc")],
            [("IVL_VC_PROVER", "stub"), ("IVL_VC_TIMEOUT_MS", "soon")],
            [("IVL_VC_PROVER", "stub"), ("IVL_VC_ASSUME_ASSERTS", "maybe")],
            [("IVL_VC_PROVER", "   "), ("IVL_VC_JOBS", "1")],
        ] {
            assert!(matches!(
                PipelineConfig::from_lookup(lookup(&vars)),
                Err(PipelineError::Config(_))
            ));
        }
    }
}
