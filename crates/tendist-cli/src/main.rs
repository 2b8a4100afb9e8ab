//! `tendist <input-file>`: HOOI Tucker decomposition of a randomly
//! filled tensor, block-distributed over an in-process SPMD grid.
//!
//! The input file gives the tensor order and, per mode, the global
//! extent, the target Tucker rank, and the process-grid factor; the
//! grid size is the product of the factors. Exit code 0 on success.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use scirs2_core::random::{rngs::StdRng, SeedableRng};
use tendist_comm::{Communicator, World};
use tendist_core::{Distribution, Tensor};
use tendist_decomp::hooi_als;
use tracing_subscriber::EnvFilter;

mod config;
mod summary;

use config::JobConfig;
use summary::Summary;

/// Seed carried over from the reference runs; each rank offsets it so
/// blocks are filled independently.
const BASE_SEED: u64 = 20000905;

const HOOI_SWEEPS: usize = 5;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tendist: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let path = env::args()
        .nth(1)
        .context("usage: tendist <input-file>")?;
    let cfg = JobConfig::from_path(&path)?;
    execute(&cfg)
}

/// Run the whole SPMD job and print rank 0's timing summary.
fn execute(cfg: &JobConfig) -> Result<()> {
    let world = cfg.world_size();
    tracing::info!(
        order = cfg.modes.len(),
        extents = ?cfg.extents(),
        ranks = ?cfg.ranks(),
        par = ?cfg.par(),
        world,
        "starting HOOI job"
    );

    let results = World::spawn(world, |comm| {
        let rank = comm.rank();
        run_rank(comm, cfg).with_context(|| format!("rank {rank}"))
    });

    let mut first = None;
    for outcome in results {
        match outcome {
            Ok(summary) => {
                if first.is_none() {
                    first = Some(summary);
                }
            }
            Err(err) => return Err(err),
        }
    }
    if let Some(summary) = first {
        summary.print(0);
    }
    Ok(())
}

fn run_rank(comm: Communicator, cfg: &JobConfig) -> Result<Summary> {
    let rank = comm.rank();
    let dist = Arc::new(Distribution::cartesian(cfg.par(), comm)?);

    let mut summary = Summary::new();
    let mut tensor = Tensor::<f64>::distributed(&dist, &cfg.extents())?;
    let mut rng = StdRng::seed_from_u64(BASE_SEED.wrapping_add(rank as u64));
    summary.time("randn", || tensor.randn(&mut rng));

    let input_norm = tensor.fnorm()?;
    let decomp = summary
        .time("hooi_als", || hooi_als(&tensor, &cfg.ranks(), HOOI_SWEEPS))?;
    let residual = decomp.residual(&tensor)?;

    tracing::info!(
        rank,
        input_norm,
        residual,
        sweeps = decomp.iters,
        "decomposition finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_job_runs_end_to_end() {
        let cfg = JobConfig::from_str_tokens("3\n6 2 2\n5 2 1\n4 2 1\n").unwrap();
        assert_eq!(cfg.world_size(), 2);
        execute(&cfg).unwrap();
    }

    #[test]
    fn single_rank_job_runs() {
        let cfg = JobConfig::from_str_tokens("2\n5 2 1\n4 2 1\n").unwrap();
        execute(&cfg).unwrap();
    }
}
