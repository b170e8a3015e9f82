use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::benchmarks::saturation::SaturationStrategy;
use crate::workload::{VolumePolicy, DEFAULT_IMAGE};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The location of the cluster configuration
    #[arg(long, env = "KUBECONFIG", global = true)]
    pub kube_config: Option<PathBuf>,

    /// Namespace for the benchmark workloads
    #[arg(long, default_value = "kubernetes-performance", global = true)]
    pub namespace: String,

    /// Comma separated node allow-list; empty selects every node
    #[arg(long, global = true)]
    pub nodes: Option<String>,

    /// Verbose mode (-v, --verbose)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command on every selected node
    Run {
        /// The command to execute; quote it, or pass it pre-tokenized after `--`
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,

        /// How each workload's storage is satisfied
        #[arg(long, value_enum, default_value_t)]
        volume: VolumeArg,

        /// Storage class for claim-backed volumes
        #[arg(long)]
        storage_class: Option<String>,

        /// Container image that runs the command
        #[arg(long, default_value = DEFAULT_IMAGE)]
        image: String,

        /// Delete workloads and claims after harvesting their logs
        #[arg(long)]
        cleanup: bool,
    },

    /// Stress the control plane with many simultaneous workloads
    Saturate {
        /// Number of workload replicas to fan out
        #[arg(short, long, default_value_t = 10)]
        replicas: i32,

        /// Saturation strategy
        #[arg(long, value_enum, default_value_t)]
        strategy: SaturationStrategy,
    },

    /// Pairwise network throughput test between the first two selected nodes
    Network {
        /// Test duration in seconds
        #[arg(short, long, default_value_t = 30)]
        duration: u64,

        /// Delete both workloads after harvesting their logs
        #[arg(long)]
        cleanup: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VolumeArg {
    #[default]
    None,
    Claim,
    Scratch,
}

impl VolumeArg {
    pub fn into_policy(self, storage_class: Option<String>) -> VolumePolicy {
        match self {
            VolumeArg::None => VolumePolicy::None,
            VolumeArg::Claim => VolumePolicy::PersistentClaim { storage_class },
            VolumeArg::Scratch => VolumePolicy::EphemeralScratch,
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
