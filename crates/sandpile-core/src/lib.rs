//! # Sandpile Core
//!
//! Core types, traits, and errors shared by the sandpile avalanche simulations.
//!
//! The simulation engines never generate networks themselves; they consume a
//! graph through the [`Topology`] trait and emit immutable per-avalanche
//! records. This crate holds those shared pieces.
//!
//! ## Key Traits
//!
//! - [`Topology`]: Node count, degree, and neighbor queries over a network
//! - [`NodeSelector`]: Picks the node that receives each grain
//! - [`Record`]: A record type with a fixed column layout
//!
//! ## Key Types
//!
//! - [`Graph`]: Dense undirected graph with tagged intra/inter-layer edges
//! - [`GraphBuilder`]: Ring, line, star, complete, and Erdős–Rényi fixtures
//! - [`AvalancheRecord`]: `iteration,S,T,G,A` for one single-layer avalanche
//! - [`CoupledAvalancheRecord`]: `p,iteration,started_in,A_0,A_1` for a coupled avalanche
//! - [`Layer`]: Layer of a node in a two-layer network

pub mod error;
pub mod graph;
pub mod record;
pub mod selector;
pub mod topology;

// Re-export main types
pub use error::*;
pub use graph::*;
pub use record::*;
pub use selector::*;
pub use topology::*;
