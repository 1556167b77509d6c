// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::Context;
use clap::{Parser, Subcommand};
use seqbench_node::config::NodeConfig;
use seqbench_node::supervisor::{CommandLauncher, Supervisor};
use seqbench_node::{shutdown_signal, telemetry, worker};

#[derive(Parser)]
#[command(name = "seqbench-node")]
#[command(about = "Multi-process sequence allocation write benchmark", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep one worker process per core alive (default)
    Supervise {
        /// Pool size, overrides SEQBENCH_WORKERS
        #[arg(long, short)]
        workers: Option<usize>,
    },
    /// Serve requests in this process. Normally started by the supervisor.
    Worker,
}

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let cli = Cli::parse();
    // Validated up front so a bad environment fails once instead of in every worker.
    let mut cfg = NodeConfig::from_env().context("loading configuration")?;

    // Both roles run a single-threaded event loop.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match cli.command.unwrap_or(Commands::Supervise { workers: None }) {
        Commands::Supervise { workers } => {
            if let Some(n) = workers {
                cfg.workers = n;
            }
            rt.block_on(async {
                tracing::info!("Supervisor {} is running, {} workers", std::process::id(), cfg.workers);
                let shutdown = shutdown_signal();
                let launcher = CommandLauncher::current_exe(shutdown.clone())?;
                let restarts = Supervisor::new(launcher, cfg.workers).run(shutdown.clone()).await;
                shutdown.cancel();
                let restarts = restarts?;
                tracing::info!(restarts, "Supervisor exited");
                Ok::<(), anyhow::Error>(())
            })
        }
        Commands::Worker => rt.block_on(async {
            let shutdown = shutdown_signal();
            worker::run_worker(cfg, shutdown).await?;
            Ok::<(), anyhow::Error>(())
        }),
    }
}
