//! Run aggregates and frequency tables
//!
//! These summarize a finished record table; they never feed back into a run.

use std::collections::BTreeMap;

use sandpile_core::{AvalancheRecord, CoupledAvalancheRecord, Layer};
use serde::{Deserialize, Serialize};

/// Summary of a single-layer run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Perturbations performed
    pub iterations: u64,
    /// Records emitted
    pub avalanches: u64,
    /// Sum of `S` over all records
    pub total_topples: u64,
    /// Largest `A`
    pub largest_area: u64,
    /// Largest `T`
    pub longest_duration: u64,
    /// Mean `S`, 0 when no avalanche occurred
    pub mean_size: f64,
}

impl RunStats {
    /// Summarize the records of a run of `iterations` perturbations
    pub fn from_records(iterations: u64, records: &[AvalancheRecord]) -> Self {
        let total_topples: u64 = records.iter().map(|r| r.size).sum();
        let mean_size = if records.is_empty() {
            0.0
        } else {
            total_topples as f64 / records.len() as f64
        };

        Self {
            iterations,
            avalanches: records.len() as u64,
            total_topples,
            largest_area: records.iter().map(|r| r.area).max().unwrap_or(0),
            longest_duration: records.iter().map(|r| r.duration).max().unwrap_or(0),
            mean_size,
        }
    }

    /// Fraction of perturbations that caused an avalanche
    pub fn avalanche_rate(&self) -> f64 {
        if self.iterations == 0 {
            0.0
        } else {
            self.avalanches as f64 / self.iterations as f64
        }
    }
}

/// Number of records per distinct area `A`, in ascending `A`
pub fn size_distribution(records: &[AvalancheRecord]) -> BTreeMap<u64, u64> {
    frequencies(records.iter().map(|r| r.area))
}

/// Number of records per duration `T`, in ascending `T`
pub fn duration_distribution(records: &[AvalancheRecord]) -> BTreeMap<u64, u64> {
    frequencies(records.iter().map(|r| r.duration))
}

fn frequencies(values: impl Iterator<Item = u64>) -> BTreeMap<u64, u64> {
    let mut table = BTreeMap::new();
    for value in values {
        *table.entry(value).or_insert(0) += 1;
    }
    table
}

/// Summary of a coupled run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoupledRunStats {
    /// Coupling probability of the run
    pub p: f64,
    /// Records emitted
    pub avalanches: u64,
    /// Records whose first unstable node was in layer 0 and layer 1
    pub started_in: [u64; 2],
    /// Records with topples in both layers
    pub cross_layer: u64,
    /// Topples per layer, summed over records
    pub layer_topples: [u64; 2],
}

impl CoupledRunStats {
    pub fn from_records(p: f64, records: &[CoupledAvalancheRecord]) -> Self {
        let mut stats = Self {
            p,
            avalanches: records.len() as u64,
            ..Self::default()
        };
        for record in records {
            stats.started_in[record.started_in.index()] += 1;
            for layer in Layer::ALL {
                stats.layer_topples[layer.index()] += record.topples_in(layer);
            }
            if record.lower_topples > 0 && record.upper_topples > 0 {
                stats.cross_layer += 1;
            }
        }
        stats
    }

    /// Fraction of recorded avalanches that reached both layers
    pub fn cross_layer_fraction(&self) -> f64 {
        if self.avalanches == 0 {
            0.0
        } else {
            self.cross_layer as f64 / self.avalanches as f64
        }
    }
}
