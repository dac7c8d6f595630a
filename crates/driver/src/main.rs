//! ivl-vc: verify the routines of a JSON-encoded IVL program.
//!
//! Usage:
//!   ivl-vc [OPTIONS] program.json
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let code = ivl_vc_driver::cli::run(&args);
    ExitCode::from(code.clamp(0, 255) as u8)
}
