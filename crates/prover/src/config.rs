use std::fmt;
use std::path::PathBuf;

use crate::error::ProverError;

/// Supported prover processes. Both speak the Simplify wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProverKind {
    /// The Simplify theorem prover.
    Simplify,
    /// Z3 running in Simplify-compatible interactive mode.
    Z3,
}

impl ProverKind {
    /// Binary name used for PATH lookup.
    fn binary_name(&self) -> &'static str {
        match self {
            ProverKind::Simplify => "simplify",
            ProverKind::Z3 => "z3",
        }
    }

    /// Common installation paths to check when PATH lookup fails.
    fn common_paths(&self) -> &'static [&'static str] {
        match self {
            ProverKind::Simplify => &[
                "/usr/local/bin/simplify",
                "/usr/bin/simplify",
                "/opt/simplify/bin/simplify",
            ],
            ProverKind::Z3 => &["/opt/homebrew/bin/z3", "/usr/local/bin/z3", "/usr/bin/z3"],
        }
    }

    /// Arguments that put the prover into interactive Simplify mode.
    fn interactive_args(&self) -> Vec<String> {
        match self {
            ProverKind::Simplify => Vec::new(),
            ProverKind::Z3 => vec!["/si".to_string()],
        }
    }

    /// Prover-specific timeout argument, if supported.
    ///
    /// Simplify has no command-line timeout; the value is only a hint.
    fn timeout_arg(&self, timeout_ms: u64) -> Option<String> {
        if timeout_ms == 0 {
            return None;
        }
        match self {
            ProverKind::Simplify => None,
            ProverKind::Z3 => Some(format!("/T:{}", timeout_ms.div_ceil(1000))),
        }
    }
}

impl fmt::Display for ProverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProverKind::Simplify => write!(f, "Simplify"),
            ProverKind::Z3 => write!(f, "Z3"),
        }
    }
}

/// Prover process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProverConfig {
    /// Which prover dialect to expect.
    pub kind: ProverKind,
    /// Path to the prover binary.
    pub prover_path: PathBuf,
    /// Timeout in milliseconds (0 = no timeout).
    pub timeout_ms: u64,
    /// Additional prover arguments.
    pub extra_args: Vec<String>,
}

impl ProverConfig {
    /// Create a new config with the given prover kind and path.
    pub fn new(kind: ProverKind, prover_path: PathBuf) -> Self {
        Self {
            kind,
            prover_path,
            timeout_ms: 0,
            extra_args: Vec::new(),
        }
    }

    /// Create config with a specific timeout (in milliseconds).
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Add extra arguments for the prover.
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Parse a whitespace-separated command line such as `"z3 /si"`.
    ///
    /// The kind is guessed from the binary's file name; anything that is not
    /// recognizably Z3 is treated as Simplify. Interactive-mode flags already
    /// present on the line are not repeated by [`build_args`](Self::build_args).
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = PathBuf::from(parts.next()?);
        let kind = match program.file_stem().and_then(|s| s.to_str()) {
            Some(stem) if stem.eq_ignore_ascii_case("z3") => ProverKind::Z3,
            _ => ProverKind::Simplify,
        };
        let interactive = kind.interactive_args();
        let extra = parts
            .filter(|a| !interactive.iter().any(|i| i == a))
            .map(str::to_string)
            .collect();
        Some(Self::new(kind, program).with_extra_args(extra))
    }

    /// Auto-detect prover location for the given kind.
    ///
    /// Tries `which <binary>` first, then checks common installation paths.
    fn auto_detect_for(kind: ProverKind) -> Result<Self, ProverError> {
        let binary = kind.binary_name();

        if let Ok(output) = std::process::Command::new("which").arg(binary).output()
            && output.status.success()
        {
            let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !path_str.is_empty() {
                let path = PathBuf::from(&path_str);
                if path.exists() {
                    return Ok(Self::new(kind, path));
                }
            }
        }

        for candidate in kind.common_paths() {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Ok(Self::new(kind, path));
            }
        }

        Err(ProverError::NotFound(kind, PathBuf::from(binary)))
    }

    /// Auto-detect Simplify, falling back to Z3.
    pub fn auto_detect() -> Result<Self, ProverError> {
        Self::auto_detect_for(ProverKind::Simplify)
            .or_else(|_| Self::auto_detect_for(ProverKind::Z3))
    }

    /// Build the full argument list for this prover invocation.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = self.kind.interactive_args();

        if let Some(timeout_arg) = self.kind.timeout_arg(self.timeout_ms) {
            args.push(timeout_arg);
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Validate that the configured prover binary exists.
    ///
    /// Bare program names are resolved through PATH at spawn time and are
    /// not checked here.
    pub fn validate(&self) -> Result<(), ProverError> {
        let bare = self.prover_path.components().count() == 1;
        if !bare && !self.prover_path.exists() {
            return Err(ProverError::NotFound(self.kind, self.prover_path.clone()));
        }
        Ok(())
    }
}
