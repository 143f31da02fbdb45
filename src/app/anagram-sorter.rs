use anagram_sorter::standalone::{engine::run_job, Args, Job};
use anagram_sorter::workload::anagram;
use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    debug!("Parsed command line arguments: {:?}", args);
    let job = Job::from(args);

    let report = run_job(&job, &anagram::pipeline())?;
    for (stage, counters) in &report.stages {
        info!("{}: {}", stage, counters);
    }
    Ok(())
}
