//! wit-recognizer command-line entry point.

mod cli;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = cli::Cli::parse();
    cli::init_tracing(cli.log_format());
    cli::run(cli).await
}
