//! Stats document output.

pub mod generator;

pub use generator::{
    generate_json, generate_summary_text, load_previous_challenges, merge_challenge_stats,
    write_document,
};
