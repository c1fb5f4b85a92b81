//!
//! Adaptive sparse grids on dyadic hierarchies: hash based point storage,
//! unidirectional sweeps, linear (de)hierarchisation, the L2 mass matrix via
//! up/down, and surplus driven refinement and coarsening.
//!
pub mod algorithms;
pub mod basis;
pub mod errors;
pub mod generators;
pub mod grids;
pub mod iterators;
pub mod refinement;
pub mod serialization;
pub mod storage;
