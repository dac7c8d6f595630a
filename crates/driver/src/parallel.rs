//! Parallel verification using Rayon.
//!
//! Routines are independent once prepared, so each worker gets its own
//! [`VcPipeline`] with its own prover process and the program's global
//! axioms. Verdicts come back in program order.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::pipeline::{RunReport, VcPipeline, encode_global_axioms, prepare_program};
use ivl_vc_analysis::ir::Program;
use ivl_vc_terms::TermBuilder;

/// Verify every routine of `program` on `config.jobs` threads.
///
/// Structural errors are found on the calling thread before any prover
/// starts. With one job this is [`VcPipeline::run`].
pub fn verify_parallel(
    program: &Program,
    config: &PipelineConfig,
) -> Result<RunReport, PipelineError> {
    if config.jobs <= 1 {
        let mut pipeline = VcPipeline::initialize(config.clone());
        let report = pipeline.run(program);
        pipeline.terminate();
        return report;
    }

    let prepared = prepare_program(program)?;
    encode_global_axioms(program, &TermBuilder::with_standard_axioms())?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build()
        .map_err(|e| PipelineError::Config(format!("cannot build thread pool: {e}")))?;
    tracing::info!(
        jobs = config.jobs,
        routines = prepared.routines.len(),
        "verifying in parallel"
    );

    let degraded = AtomicBool::new(false);
    let routines = pool.install(|| {
        prepared
            .routines
            .par_iter()
            .map_init(
                || {
                    let mut pipeline = VcPipeline::initialize(config.clone());
                    pipeline.install_program(program).map(|()| pipeline)
                },
                |worker, routine| {
                    let pipeline = worker
                        .as_mut()
                        .map_err(|e| PipelineError::Config(e.to_string()))?;
                    let report = pipeline.report(routine)?;
                    if pipeline.is_degraded() {
                        degraded.store(true, Ordering::Relaxed);
                    }
                    Ok(report)
                },
            )
            .collect::<Result<Vec<_>, PipelineError>>()
    })?;

    Ok(RunReport {
        routines,
        degraded: degraded.load(Ordering::Relaxed),
    })
}
