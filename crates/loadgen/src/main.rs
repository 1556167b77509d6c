use clap::Parser;

#[derive(Parser)]
#[command(name = "seqbench-loadgen")]
#[command(about = "Concurrent write load against a seqbench node", long_about = None)]
struct Cli {
    /// Base URL of the node
    #[arg(long, short, default_value = "http://127.0.0.1:3000")]
    url: String,

    /// Requests in flight per batch
    #[arg(long, short, default_value_t = 1000)]
    concurrency: usize,

    /// Requests to send in total
    #[arg(long, short, default_value_t = 10000)]
    total: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.total == 0 {
        anyhow::bail!("--total must be at least 1");
    }

    println!(
        "Starting load test with {} concurrent requests, {} total requests",
        cli.concurrency, cli.total
    );

    let report = seqbench_loadgen::run(&cli.url, cli.concurrency, cli.total).await;
    println!("\n{}", report.render());
    Ok(())
}
