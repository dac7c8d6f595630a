/// `ivl-vc` command-line front end.
///
/// Reads a JSON program, verifies every routine and prints the verdicts:
/// 1. Configuration comes from the environment, then from flags
/// 2. Structural errors abort before any routine is verified
/// 3. Verdicts go to stderr, or to stdout as JSON with `--output-format json`
///
/// Exit status is 0 when every routine verifies, 1 when some do not or no
/// prover checked them, and 2 on usage or input errors.
use std::path::Path;

use colored::Colorize;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::json_output::{JsonReport, print_json_report};
use crate::output;
use crate::parallel::verify_parallel;
use crate::pipeline::RunReport;
use ivl_vc_analysis::VcMethod;
use ivl_vc_analysis::ir::Program;
use ivl_vc_prover::ProverConfig;

pub const EXIT_OK: i32 = 0;
pub const EXIT_NOT_VERIFIED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOptions {
    pub file: Option<String>,
    pub json: bool,
    pub verbose: bool,
    pub method: Option<VcMethod>,
    pub assume_asserts: bool,
    pub jobs: Option<usize>,
    /// Prover command line, or `stub`.
    pub prover: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Run the tool on `args` (without the program name).
pub fn run(args: &[String]) -> i32 {
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return EXIT_OK;
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        eprintln!(
            "ivl-vc {}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("0.1.0")
        );
        return EXIT_OK;
    }

    match try_run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            EXIT_ERROR
        }
    }
}

fn try_run(args: &[String]) -> Result<i32, PipelineError> {
    let options = parse_args(args)?;
    let file = options
        .file
        .clone()
        .ok_or_else(|| PipelineError::Config("missing input file (try --help)".to_string()))?;
    let config = apply_options(PipelineConfig::from_env()?, &options)?;
    let program = load_program(Path::new(&file))?;

    if !options.json {
        output::print_header(&file, program.routines.len());
    }
    let report = verify_parallel(&program, &config)?;

    if options.json {
        print_json_report(&JsonReport::from_run(&file, config.method, &report));
    } else {
        output::print_run_report(&report, options.verbose);
    }
    Ok(exit_code(&report))
}

/// Exit status for a finished run. Verdicts from the stub prover are
/// unchecked, so a degraded run never counts as verified.
pub fn exit_code(report: &RunReport) -> i32 {
    if report.degraded {
        tracing::warn!("no prover checked the verdicts");
        return EXIT_NOT_VERIFIED;
    }
    if report.all_ok() {
        EXIT_OK
    } else {
        EXIT_NOT_VERIFIED
    }
}

/// Read a program from its JSON form.
pub fn load_program(path: &Path) -> Result<Program, PipelineError> {
    let text = std::fs::read_to_string(path)?;
    let program: Program = serde_json::from_str(&text)?;
    tracing::debug!(
        file = %path.display(),
        routines = program.routines.len(),
        procedures = program.procedures.len(),
        axioms = program.axioms.len(),
        "loaded program"
    );
    Ok(program)
}

/// Override `config` with whatever the command line set.
pub fn apply_options(
    mut config: PipelineConfig,
    options: &CliOptions,
) -> Result<PipelineConfig, PipelineError> {
    if let Some(method) = options.method {
        config.method = method;
    }
    if options.assume_asserts {
        config.assume_asserts = true;
    }
    if let Some(jobs) = options.jobs {
        config = config.with_jobs(jobs);
    }
    if let Some(line) = &options.prover {
        config.prover = if line.eq_ignore_ascii_case("stub") {
            None
        } else {
            Some(ProverConfig::from_command_line(line).ok_or_else(|| {
                PipelineError::Config("--prover needs a command".to_string())
            })?)
        };
    }
    if let Some(timeout_ms) = options.timeout_ms {
        config.prover = config.prover.map(|p| p.with_timeout(timeout_ms));
    }
    Ok(config)
}

/// Parse the command line. Flags take `--flag value` or `--flag=value`.
pub fn parse_args(args: &[String]) -> Result<CliOptions, PipelineError> {
    let mut options = CliOptions::default();
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag, Some(value.to_string())),
            _ => (arg, None),
        };
        let mut value = |name: &str| -> Result<String, PipelineError> {
            if let Some(v) = inline.clone() {
                return Ok(v);
            }
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| PipelineError::Config(format!("{name} needs a value")))
        };

        match flag {
            "--json" => options.json = true,
            "--output-format" => {
                let format = value(flag)?;
                options.json = match format.as_str() {
                    "json" => true,
                    "text" => false,
                    other => {
                        return Err(PipelineError::Config(format!(
                            "unknown output format: {other}"
                        )));
                    }
                };
            }
            "--verbose" | "-v" => options.verbose = true,
            "--sp" => options.method = Some(VcMethod::Sp),
            "--wp" => options.method = Some(VcMethod::Wp),
            "--method" => {
                options.method = Some(value(flag)?.parse().map_err(PipelineError::Config)?);
            }
            "--assume-asserts" => options.assume_asserts = true,
            "--jobs" | "-j" => options.jobs = Some(parse_number(flag, &value(flag)?)?),
            "--prover" => options.prover = Some(value(flag)?),
            "--timeout" => options.timeout_ms = Some(parse_number(flag, &value(flag)?)?),
            _ if flag.starts_with('-') => {
                return Err(PipelineError::Config(format!("unknown flag: {arg}")));
            }
            _ if options.file.is_none() => options.file = Some(arg.to_string()),
            _ => {
                return Err(PipelineError::Config(format!("unexpected argument: {arg}")));
            }
        }
        i += 1;
    }
    Ok(options)
}

fn parse_number<T: std::str::FromStr>(flag: &str, raw: &str) -> Result<T, PipelineError> {
    raw.trim()
        .parse()
        .map_err(|_| PipelineError::Config(format!("{flag} expects a number, got {raw}")))
}

fn print_usage() {
    eprintln!("{}", "ivl-vc: verification conditions for IVL programs".bold());
    eprintln!();
    eprintln!("Usage: ivl-vc [OPTIONS] <PROGRAM.json>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --method <wp|sp>         VC generation method (default: wp)");
    eprintln!("  --wp, --sp               Shorthands for --method");
    eprintln!("  --assume-asserts         Assume each assertion after checking it");
    eprintln!("  --prover <CMD|stub>      Prover command line (default: auto-detect)");
    eprintln!("  --timeout <MS>           Per-query timeout hint in milliseconds");
    eprintln!("  -j, --jobs <N>           Verify routines on N threads");
    eprintln!("  --output-format <FMT>    text (default) or json");
    eprintln!("  --json                   Same as --output-format json");
    eprintln!("  -v, --verbose            Show per-routine timing");
    eprintln!("  -h, --help               Show this help message");
    eprintln!("  -V, --version            Show version");
    eprintln!();
    eprintln!("Exit status: 0 verified, 1 not verified or no prover, 2 error");
    eprintln!();
    eprintln!("Environment: IVL_VC_PROVER, IVL_VC_TIMEOUT_MS, IVL_VC_METHOD,");
    eprintln!("             IVL_VC_ASSUME_ASSERTS, IVL_VC_JOBS, RUST_LOG");
}
