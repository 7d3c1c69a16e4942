//! navinet-run - foraging trials for population-vector agents
//!
//! Each agent owns a controller and an arena; agents never interact, so
//! they can run on separate threads (`parallel` feature).
//!
//! Usage:
//!   navinet-run [--config FILE] [--seed N] [--agents N]

use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{error, info};

mod arena;
mod config;
mod error;
mod log;
mod trial;

use config::RunConfig;
use error::RunError;
use trial::{Runner, Summary};

#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    seed: Option<u64>,
    agents: Option<usize>,
}

fn print_usage() {
    eprintln!("Usage: navinet-run [--config FILE] [--seed N] [--agents N]\n");
    eprintln!("  --config FILE   JSON run configuration (defaults when omitted)");
    eprintln!("  --seed N        Base seed; agent i uses N + i");
    eprintln!("  --agents N      Number of independent agents");
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut out = Args::default();
    let mut it = args.into_iter();
    while let Some(flag) = it.next() {
        let mut value = || it.next().ok_or_else(|| format!("{flag} needs a value"));
        match flag.as_str() {
            "--config" => out.config = Some(PathBuf::from(value()?)),
            "--seed" => {
                let v = value()?;
                out.seed = Some(v.parse().map_err(|_| format!("bad seed: {v}"))?);
            }
            "--agents" => {
                let v = value()?;
                out.agents = Some(v.parse().map_err(|_| format!("bad agent count: {v}"))?);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(out)
}

fn run_agent(cfg: &RunConfig, agent: usize) -> Result<Summary, RunError> {
    Runner::new(cfg, agent)?.run()
}

#[cfg(feature = "parallel")]
fn run_agents(cfg: &RunConfig) -> Vec<Result<Summary, RunError>> {
    use rayon::prelude::*;
    (0..cfg.agents)
        .into_par_iter()
        .map(|agent| run_agent(cfg, agent))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn run_agents(cfg: &RunConfig) -> Vec<Result<Summary, RunError>> {
    (0..cfg.agents).map(|agent| run_agent(cfg, agent)).collect()
}

fn run(args: Args) -> Result<(), RunError> {
    let mut cfg = match &args.config {
        Some(path) => {
            info!("Config file: {:?}", path);
            RunConfig::load(path)?
        }
        None => RunConfig::default(),
    };
    if let Some(seed) = args.seed {
        cfg = cfg.with_seed(seed);
    }
    if let Some(agents) = args.agents {
        cfg = cfg.with_agents(agents);
    }
    cfg.validate()?;
    if let Some(dir) = &cfg.output_dir {
        info!("Output directory: {:?}", dir);
    }

    let mut failed = None;
    for result in run_agents(&cfg) {
        match result {
            Ok(s) => println!(
                "agent {}: trials {} goal_hits {} homed {} mean_pi_error {:.4}",
                s.agent, s.trials, s.goal_hits, s.homed, s.mean_pi_error
            ),
            Err(e) => {
                error!("agent failed: {e}");
                failed.get_or_insert(e);
            }
        }
    }
    match failed {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(a) => a,
        Err(msg) => {
            eprintln!("{msg}");
            print_usage();
            return ExitCode::from(2);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
