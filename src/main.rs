use clap::Parser;
use tracing_subscriber::EnvFilter;

use talostpl::cli::output::{display_error, OutputConfig};
use talostpl::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let output = OutputConfig::new(cli.quiet, cli.json, cli.verbose);

    // RUST_LOG, when set, overrides the -v count
    let filter = EnvFilter::builder()
        .with_default_directive(output.log_level().into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    output.apply_global();

    if let Err(err) = cli.run().await {
        display_error(&err);
        std::process::exit(1);
    }
}
