//! Civitas - Entry Point
//!
//! Builds the demo town, starts the decision worker and runs the tick loop at
//! a fixed rate.

use civitas::core::config::SimulationConfig;
use civitas::core::error::Result;
use civitas::core::logging;
use civitas::llm::{DecisionWorker, LlmClient, ScriptedBackend};
use civitas::simulation::{demo_town, SharedSimulation, Simulation, TickSummary};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Town simulation with fast autopilot and slow backend decisions
#[derive(Parser, Debug)]
#[command(name = "civitas")]
#[command(about = "Run the civitas town simulation")]
struct Args {
    /// TOML config file (missing values use defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ticks to run
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Townsfolk to spawn
    #[arg(long, default_value_t = 12)]
    agents: usize,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Ticks per second
    #[arg(long, default_value_t = 10.0)]
    tps: f64,

    /// Use the in-process scripted backend even if an endpoint is configured
    #[arg(long)]
    scripted: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    logging::init(&config.logging)?;

    let seed = args.seed.unwrap_or_else(rand::random);
    tracing::info!(seed, agents = args.agents, ticks = args.ticks, "civitas starting");

    let sim = demo_town(config.clone(), seed, args.agents);
    let queue = sim.queue();
    let shared = sim.into_shared();

    let worker = start_worker(&args, &config, &shared, queue)?;

    let totals = run_loop(&shared, &worker, args.ticks, args.tps);

    worker.shutdown()?;
    report(&shared, &totals);
    Ok(())
}

fn start_worker(
    args: &Args,
    config: &SimulationConfig,
    shared: &SharedSimulation,
    queue: Arc<civitas::llm::DecisionQueue>,
) -> Result<DecisionWorker> {
    let wants_http = !args.scripted
        && (config.backend.api_url.is_some() || std::env::var("LLM_API_URL").is_ok());

    if wants_http {
        match LlmClient::from_config(&config.backend) {
            Ok(client) => {
                tracing::info!(model = client.model(), "using HTTP reasoning backend");
                return DecisionWorker::spawn(
                    Arc::clone(shared),
                    queue,
                    client,
                    config.worker.clone(),
                );
            }
            Err(e) => tracing::warn!(error = %e, "backend unavailable, using scripted decisions"),
        }
    } else {
        tracing::info!("using scripted reasoning backend");
    }

    DecisionWorker::spawn(
        Arc::clone(shared),
        queue,
        ScriptedBackend::from_config(&config.backend),
        config.worker.clone(),
    )
}

fn run_loop(shared: &SharedSimulation, worker: &DecisionWorker, ticks: u64, tps: f64) -> TickSummary {
    let period = Duration::from_secs_f64(1.0 / tps.max(0.1));
    let mut totals = TickSummary::default();
    let mut next = Instant::now();

    for _ in 0..ticks {
        let summary = Simulation::lock(shared).step(1.0);
        totals.tick = summary.tick;
        totals.spikes += summary.spikes;
        totals.autopilot_decisions += summary.autopilot_decisions;
        totals.enqueued += summary.enqueued;
        totals.deaths += summary.deaths;

        if summary.tick % 100 == 0 {
            tracing::info!(
                tick = summary.tick,
                spikes = totals.spikes,
                autopilot = totals.autopilot_decisions,
                queued = totals.enqueued,
                deaths = totals.deaths,
                "progress"
            );
            if !worker.is_running() {
                tracing::error!("decision worker has stopped, queued agents will not get answers");
            }
        }

        next += period;
        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        } else {
            next = now;
        }
    }
    totals
}

fn report(shared: &SharedSimulation, totals: &TickSummary) {
    let sim = Simulation::lock(shared);
    println!("\n=== CIVITAS after {} ticks ===", sim.tick());
    println!(
        "spikes: {}  autopilot decisions: {}  backend requests: {}  deaths: {}",
        totals.spikes, totals.autopilot_decisions, totals.enqueued, totals.deaths
    );
    println!();
    for agent in &sim.agents {
        let status = if agent.alive { "alive" } else { "dead" };
        println!(
            "{:<12} {:<10} {:>8} {:<6} hp {:>5.1}  {}",
            agent.name,
            agent.role.to_string(),
            agent.position.to_string(),
            status,
            agent.health,
            agent.current_thought
        );
    }
}
