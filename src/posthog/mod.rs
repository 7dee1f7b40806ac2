//! PostHog API access.
//!
//! This module provides the HTTP client used to pull raw events and the
//! [`EventSource`] seam the aggregators fetch through.

pub mod client;

pub use client::{EventSource, PostHogClient};
