use std::fmt;

/// Error taxonomy for a benchmark run.
///
/// Everything is still carried through `anyhow::Result`; these variants exist
/// so the top-level run loop can tell a selection problem (nothing was
/// mutated) from a gateway or harvest failure (created resources may need
/// cleaning up) and so cancellation is distinguishable from failure.
#[derive(Debug)]
pub enum BenchError {
    /// Bad or missing cluster credentials. Raised before any cluster mutation.
    Config(String),
    /// The node allow-list matched nothing in the inventory.
    EmptySelection,
    /// A benchmark needed more nodes than the selection provides.
    InsufficientNodes { required: usize, available: usize },
    /// A cluster API call failed.
    Gateway(String),
    /// Log collection or artifact writing failed.
    Harvest(String),
    /// The run was interrupted; created resources still get best-effort cleanup.
    Cancelled,
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchError::Config(msg) => write!(f, "cluster configuration error: {}", msg),
            BenchError::EmptySelection => {
                write!(f, "node selection is empty, nothing to benchmark")
            }
            BenchError::InsufficientNodes {
                required,
                available,
            } => write!(
                f,
                "benchmark requires at least {} nodes but only {} selected",
                required, available
            ),
            BenchError::Gateway(msg) => write!(f, "cluster gateway error: {}", msg),
            BenchError::Harvest(msg) => write!(f, "log harvest error: {}", msg),
            BenchError::Cancelled => write!(f, "benchmark run cancelled"),
        }
    }
}

impl std::error::Error for BenchError {}
