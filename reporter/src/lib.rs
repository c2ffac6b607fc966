//! Plots and statistics for protein binder competition submissions.
//!
//! The pipeline is load → validate → filter → transform → statistic → render:
//! [`data_handling`] reads and normalizes the submission table, [`filters`]
//! reduces it to the working subset for one plot, [`analysis`] computes the
//! statistics, and [`charts`] renders themed plotters output. [`pipeline`]
//! wires the stages together and [`cli`] exposes one subcommand per plot kind.

pub mod analysis;
pub mod charts;
pub mod cli;
pub mod data_handling;
pub mod filters;
pub mod metrics;
pub mod models;
pub mod pipeline;
