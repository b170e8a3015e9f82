use std::sync::Arc;

use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use kubeperf::benchmarks::{distributed, network, saturation};
use kubeperf::clap_args::{self, Args, Commands};
use kubeperf::gateway::{ClusterGateway, KubeGateway};
use kubeperf::{execute, BenchmarkMode, RunContext};

#[tokio::main]
async fn main() {
    let args = clap_args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(args).await {
        eprintln!("{}", format!("Error: {e:#}").red());
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    // Ctrl-C cancels every poll loop; the run then falls through to
    // best-effort cleanup of whatever it created.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("\nInterrupted, cleaning up...");
                cancel.cancel();
            }
        });
    }

    let gateway: Arc<dyn ClusterGateway> =
        Arc::new(KubeGateway::connect(args.kube_config.as_deref()).await?);

    let ctx = RunContext::prepare(
        gateway,
        &args.namespace,
        args.nodes.as_deref(),
        std::env::current_dir()?,
        cancel,
    )
    .await?;

    let mode = match args.command {
        Commands::Run {
            command,
            volume,
            storage_class,
            image,
            cleanup,
        } => BenchmarkMode::DistributedCommand(distributed::RunOptions {
            command,
            image,
            volume: volume.into_policy(storage_class),
            cleanup,
        }),
        Commands::Saturate { replicas, strategy } => {
            // cleanup is implied for saturation runs
            BenchmarkMode::Saturation(saturation::SaturationOptions {
                replicas,
                strategy,
                cleanup: true,
            })
        }
        Commands::Network { duration, cleanup } => {
            BenchmarkMode::NetworkTest(network::NetworkOptions {
                duration_secs: duration,
                cleanup,
            })
        }
    };

    execute(&ctx, mode).await
}
