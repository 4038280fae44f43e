use clap::Parser;
use llm_gateway::cli::Cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    llm_gateway::logging::init(cli.verbose);
    llm_gateway::cli::run(cli).await
}
