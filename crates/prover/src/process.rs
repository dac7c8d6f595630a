//! A long-running prover child process.
//!
//! Commands are written one per line. Only validity queries produce output:
//! any number of informational lines (counterexample labels, prompts)
//! followed by a verdict line `N: Valid.` or `N: Invalid.`.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use crate::config::ProverConfig;
use crate::error::ProverError;

/// Persistent prover process speaking the Simplify protocol.
#[derive(Debug)]
pub struct SimplifyProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    queries: u64,
    terminated: bool,
}

impl SimplifyProcess {
    /// Spawn the prover described by `config`.
    pub fn spawn(config: &ProverConfig) -> Result<Self, ProverError> {
        config.validate()?;
        let args = config.build_args();
        tracing::debug!(
            prover = %config.kind,
            path = %config.prover_path.display(),
            ?args,
            "starting prover process"
        );

        let mut child = Command::new(&config.prover_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                ProverError::Spawn(format!("{}: {e}", config.prover_path.display()))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProverError::Spawn("failed to open prover stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProverError::Spawn("failed to open prover stdout".to_string()))?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            queries: 0,
            terminated: false,
        })
    }

    /// Write a command that produces no output, then check the child is alive.
    pub fn send(&mut self, command: &str) -> Result<(), ProverError> {
        self.write_line(command)?;
        self.check_alive()
    }

    /// Ask whether `formula` is valid under the current assumptions.
    pub fn query(&mut self, formula: &str) -> Result<bool, ProverError> {
        self.write_line(formula)?;
        self.queries += 1;
        loop {
            let mut line = String::new();
            if self.stdout.read_line(&mut line)? == 0 {
                return Err(ProverError::Exited(self.exit_code()));
            }
            match parse_response_line(&line)? {
                Some(verdict) => return Ok(verdict),
                None => tracing::trace!(line = line.trim_end(), "prover output"),
            }
        }
    }

    /// Fails with [`ProverError::Exited`] if the child has terminated.
    pub fn check_alive(&mut self) -> Result<(), ProverError> {
        match self.child.try_wait()? {
            Some(status) => Err(ProverError::Exited(status.code())),
            None => Ok(()),
        }
    }

    /// Number of queries sent so far.
    pub fn query_count(&self) -> u64 {
        self.queries
    }

    /// Kill and reap the child. Safe to call more than once.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        if let Err(e) = self.child.kill() {
            tracing::trace!(error = %e, "prover already gone");
        }
        if let Err(e) = self.child.wait() {
            tracing::debug!(error = %e, "failed to reap prover process");
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), ProverError> {
        tracing::trace!(command = line, "to prover");
        writeln!(self.stdin, "{line}")?;
        self.stdin.flush()?;
        Ok(())
    }

    fn exit_code(&mut self) -> Option<i32> {
        self.child.try_wait().ok().flatten().and_then(|s| s.code())
    }
}

impl Drop for SimplifyProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Interpret one line of prover output.
///
/// Returns `Some(true)` for a valid verdict, `Some(false)` for an invalid
/// one, and `None` for informational lines.
pub fn parse_response_line(line: &str) -> Result<Option<bool>, ProverError> {
    let line = line.trim();
    if line.starts_with("Bad input") {
        return Err(ProverError::Malformed(line.to_string()));
    }
    let verdict = match line.split_once(':') {
        Some((n, rest)) if !n.is_empty() && n.trim().chars().all(|c| c.is_ascii_digit()) => {
            rest.trim()
        }
        _ => line,
    };
    match verdict {
        "Valid." => Ok(Some(true)),
        "Invalid." => Ok(Some(false)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid() {
        assert_eq!(parse_response_line("1: Valid.\n").unwrap(), Some(true));
        assert_eq!(parse_response_line("Valid.").unwrap(), Some(true));
    }

    #[test]
    fn parse_invalid() {
        assert_eq!(parse_response_line("12: Invalid.").unwrap(), Some(false));
    }

    #[test]
    fn parse_noise() {
        assert_eq!(parse_response_line("Counterexample:").unwrap(), None);
        assert_eq!(parse_response_line("  labels: (L1 L2)").unwrap(), None);
        assert_eq!(parse_response_line("").unwrap(), None);
    }

    #[test]
    fn parse_bad_input() {
        let err = parse_response_line("Bad input: unexpected )").unwrap_err();
        assert!(matches!(err, ProverError::Malformed(_)));
    }

    #[test]
    fn spawn_missing_binary_fails() {
        let config = ProverConfig::new(
            crate::config::ProverKind::Simplify,
            std::path::PathBuf::from("/nonexistent/simplify"),
        );
        assert!(matches!(
            SimplifyProcess::spawn(&config),
            Err(ProverError::NotFound(..))
        ));
    }
}
