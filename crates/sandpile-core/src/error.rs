//! Error types for sandpile simulations
//!
//! All of these are validation failures raised before a run starts. Degenerate
//! but valid inputs (isolated nodes, a dissipation rate of exactly 0 or 1) are
//! never reported as errors.

use thiserror::Error;

/// Top-level error type for sandpile simulations
#[derive(Debug, Error)]
pub enum SandpileError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Coupling error: {0}")]
    Coupling(#[from] CouplingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Errors related to graph structure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Edge references unknown node {node} (graph has {node_count} nodes)")]
    UnknownNode { node: usize, node_count: usize },

    #[error("Asymmetric adjacency: {from} lists {to} but not the reverse")]
    AsymmetricEdge { from: usize, to: usize },

    #[error("Graph has no nodes")]
    Empty,

    #[error("No {degree}-regular graph exists on {node_count} nodes")]
    InvalidRegularDegree { degree: usize, node_count: usize },

    #[error("Random graph generation failed after {attempts} attempts")]
    GenerationFailed { attempts: usize },
}

/// Errors related to composing two layers into a coupled graph
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CouplingError {
    #[error("Layer node count mismatch: expected {expected}, lower has {lower}, upper has {upper}")]
    NodeCountMismatch {
        expected: usize,
        lower: usize,
        upper: usize,
    },

    #[error("Layer size must be positive")]
    ZeroLayerSize,
}

/// Errors related to run parameters
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Dissipation rate must be within [0, 1], got {0}")]
    InvalidDissipationRate(f64),

    #[error("Coupling probability must be within [0, 1], got {0}")]
    InvalidProbability(f64),

    #[error("Iteration count must be a positive number, got {0}")]
    InvalidIterations(f64),

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Errors from the sweep worker pool
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Failed to build worker pool: {0}")]
    Build(String),

    #[error("Worker pool needs at least one thread")]
    NoThreads,
}

/// Result type alias for sandpile operations
pub type SandpileResult<T> = Result<T, SandpileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_display() {
        let err = GraphError::UnknownNode {
            node: 7,
            node_count: 4,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("unknown node 7"));
        assert!(msg.contains("4 nodes"));

        let err = GraphError::AsymmetricEdge { from: 1, to: 2 };
        assert!(format!("{}", err).contains("Asymmetric"));

        assert!(format!("{}", GraphError::Empty).contains("no nodes"));

        let err = GraphError::InvalidRegularDegree {
            degree: 3,
            node_count: 5,
        };
        assert!(format!("{}", err).contains("3-regular"));
    }

    #[test]
    fn test_coupling_error_display() {
        let err = CouplingError::NodeCountMismatch {
            expected: 4,
            lower: 4,
            upper: 5,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("expected 4"));
        assert!(msg.contains("upper has 5"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidDissipationRate(1.5);
        assert!(format!("{}", err).contains("1.5"));

        let err = ConfigError::InvalidIterations(-3.0);
        assert!(format!("{}", err).contains("-3"));

        let err = ConfigError::InvalidField {
            field: "threads",
            reason: "must be positive".to_string(),
        };
        assert!(format!("{}", err).contains("threads"));
    }

    #[test]
    fn test_error_conversions() {
        let err: SandpileError = GraphError::Empty.into();
        assert!(matches!(err, SandpileError::Graph(_)));

        let err: SandpileError = CouplingError::ZeroLayerSize.into();
        assert!(matches!(err, SandpileError::Coupling(_)));

        let err: SandpileError = ConfigError::InvalidProbability(2.0).into();
        assert!(matches!(err, SandpileError::Config(_)));

        let err: SandpileError = PoolError::NoThreads.into();
        assert!(matches!(err, SandpileError::Pool(_)));
    }

    #[test]
    fn test_sandpile_error_display() {
        let err: SandpileError = GraphError::Empty.into();
        let msg = format!("{}", err);
        assert!(msg.contains("Graph error"));
        assert!(msg.contains("no nodes"));
    }
}
