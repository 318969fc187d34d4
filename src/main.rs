mod cli;
mod config;
mod error;
mod filter;
mod mirror;
mod models;
mod output;
mod registry;
mod retry;
mod runtime;
mod worker;

use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use cli::Cli;
use config::Config;
use output::{print_reports, print_summary};
use registry::TagResolver;
use runtime::{ContainerRuntime, DockerCli};
use worker::Dispatcher;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(default_level));

    let config = Config::load(&cli.config)?;

    let runtime: Arc<dyn ContainerRuntime> = Arc::new(DockerCli::new());
    runtime
        .ping()
        .await
        .context("Container runtime is not reachable")?;

    let resolver = Arc::new(TagResolver::new()?);
    let dispatcher = Dispatcher::new(config, resolver, runtime);
    let reports = dispatcher.run(cli.prefix.as_deref()).await;

    print_reports(&reports);
    print_summary(&reports);

    if !cli.ignore_errors && reports.iter().any(|r| r.failed()) {
        process::exit(1);
    }

    Ok(())
}
