use clap::Parser;

use write_perf::{Cli, LOAD_TEST_ENABLED, Outcome, execute};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let gate = std::env::var(LOAD_TEST_ENABLED).ok();

    let outcome = execute(gate.as_deref(), &cli.args).await;
    match &outcome {
        Outcome::Passed(metrics) => {
            tracing::info!(rows = metrics.rows_written, runtime_ms = metrics.runtime_ms, "passed");
        }
        Outcome::Skipped(reason) => eprintln!("Skipped: {reason}"),
        Outcome::Failed(e) => eprintln!("Error: {e}"),
    }
    std::process::exit(outcome.exit_code());
}
