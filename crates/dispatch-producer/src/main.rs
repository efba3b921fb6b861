mod config;

use clap::Parser;
use config::AppConfig;
use dispatch_client::{
    ConsoleReporter, HeartbeatWatcher, Orchestrator, ProducerLoop, RetryPolicy, Submitter,
    TaskWatchers,
};
use dispatch_core::{FaultInjector, Queue, Synthesizer};
use dispatch_sim::LocalQueue;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "dispatch-producer")]
#[command(about = "Emergency dispatch task producer", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(long)]
    config: Option<String>,

    /// Length of one time unit in milliseconds
    #[arg(long)]
    time_unit_ms: Option<u64>,

    /// Number of simulated workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json);

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::default()
    };

    // Override with CLI args
    if let Some(time_unit_ms) = args.time_unit_ms {
        config.producer.time_unit_ms = time_unit_ms;
    }
    if let Some(workers) = args.workers {
        config.simulator.workers = workers;
    }

    let unit = config.producer.time_unit();
    let queue: Arc<dyn Queue> = Arc::new(LocalQueue::start(config.simulator.clone()));
    let reporter = ConsoleReporter::stdout();
    let watchers = TaskWatchers::new(queue.clone(), Arc::new(reporter.clone()));

    let seed = config.producer.seed;
    let probability = config.producer.fault_probability;
    let faults = match seed {
        Some(seed) => FaultInjector::with_seed(probability, seed.wrapping_add(1)),
        None => FaultInjector::new(probability),
    };

    let mut submitter = Submitter::new(queue.clone(), watchers, reporter.clone())
        .with_faults(faults)
        .with_policy(RetryPolicy::with_unit(unit));
    if let Some(seed) = seed {
        submitter = submitter.with_source(Synthesizer::with_seed(seed));
    }

    let mut producer = ProducerLoop::new(submitter, unit);
    if let Some(seed) = seed {
        producer = producer.with_seed(seed.wrapping_add(2));
    }
    let heartbeats = HeartbeatWatcher::new(queue, Arc::new(reporter));

    tracing::info!(
        time_unit_ms = config.producer.time_unit_ms,
        fault_probability = config.producer.fault_probability,
        workers = config.simulator.workers,
        "Starting dispatch producer"
    );

    let mut orchestrator = Orchestrator::new(unit);
    orchestrator.start(producer, heartbeats);
    orchestrator
        .park_until(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await;
    orchestrator.shutdown().await;

    Ok(())
}
