use std::env;
use std::process;

use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "battlelog=info";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    process::exit(battlelog::cli::run_with_args(&args));
}
