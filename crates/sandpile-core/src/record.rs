//! Per-avalanche records
//!
//! Records are created once per completed avalanche and never mutated. Their
//! serialized field names are the column names downstream analysis expects:
//! `iteration,S,T,G,A` for single-layer runs and `p,iteration,started_in,A_0,A_1`
//! for coupled runs.

use serde::{Deserialize, Serialize};

/// Layer of a node in a coupled two-layer network
///
/// Serializes as the integer `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Layer {
    /// Layer 0: nodes `0..N`
    Lower,
    /// Layer 1: nodes `N..2N`
    Upper,
}

impl Layer {
    /// Both layers in index order
    pub const ALL: [Layer; 2] = [Layer::Lower, Layer::Upper];

    /// Numeric layer index
    pub fn index(self) -> usize {
        match self {
            Layer::Lower => 0,
            Layer::Upper => 1,
        }
    }
}

impl From<Layer> for u8 {
    fn from(layer: Layer) -> Self {
        layer.index() as u8
    }
}

impl TryFrom<u8> for Layer {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Layer::Lower),
            1 => Ok(Layer::Upper),
            other => Err(format!("invalid layer index {other}")),
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// A record type with a fixed column layout
pub trait Record: Serialize + Clone + Send {
    /// Column names in serialization order
    const COLUMNS: &'static [&'static str];

    /// Index of the perturbation that triggered the avalanche
    fn iteration(&self) -> u64;
}

/// One single-layer avalanche
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvalancheRecord {
    /// Index of the triggering perturbation
    pub iteration: u64,
    /// Total topples, repeats included
    #[serde(rename = "S")]
    pub size: u64,
    /// Cascade rounds
    #[serde(rename = "T")]
    pub duration: u64,
    /// Grains delivered to neighbors (non-dissipated propagation edges)
    #[serde(rename = "G")]
    pub propagated: u64,
    /// Distinct nodes toppled
    #[serde(rename = "A")]
    pub area: u64,
}

impl Record for AvalancheRecord {
    const COLUMNS: &'static [&'static str] = &["iteration", "S", "T", "G", "A"];

    fn iteration(&self) -> u64 {
        self.iteration
    }
}

/// One avalanche on a coupled network
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoupledAvalancheRecord {
    /// Coupling probability the network was built with
    pub p: f64,
    /// Index of the triggering perturbation
    pub iteration: u64,
    /// Layer of the node that first became unstable
    pub started_in: Layer,
    /// Topples in layer 0, repeats included
    #[serde(rename = "A_0")]
    pub lower_topples: u64,
    /// Topples in layer 1, repeats included
    #[serde(rename = "A_1")]
    pub upper_topples: u64,
}

impl CoupledAvalancheRecord {
    /// Total topple events across both layers
    pub fn total_topples(&self) -> u64 {
        self.lower_topples + self.upper_topples
    }

    /// Topples in the given layer
    pub fn topples_in(&self, layer: Layer) -> u64 {
        match layer {
            Layer::Lower => self.lower_topples,
            Layer::Upper => self.upper_topples,
        }
    }
}

impl Record for CoupledAvalancheRecord {
    const COLUMNS: &'static [&'static str] = &["p", "iteration", "started_in", "A_0", "A_1"];

    fn iteration(&self) -> u64 {
        self.iteration
    }
}
