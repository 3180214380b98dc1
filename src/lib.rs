//! graphtx - batched transactional execution for graph stores.
//!
//! Drains an input sequence through a unit of work, one transaction per
//! fixed-size batch, isolating failures per batch and tracking progress.

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
