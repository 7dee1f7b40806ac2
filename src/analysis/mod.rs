//! Statistic families.
//!
//! Each family module folds one or more event lists into summary records;
//! [`runner::collect_stats`] fetches the events and assembles the document.

pub mod aggregator;
pub mod challenges;
pub mod community;
pub mod effectiveness;
pub mod runner;
pub mod stages;
pub mod tools;

pub use runner::collect_stats;
