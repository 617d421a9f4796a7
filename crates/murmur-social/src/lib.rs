//! Reaction and thread views over a message stream.
//!
//! - Per-emoji reaction groups derived from raw reaction events
//! - One-level reply threads keyed by their root message

pub mod reactions;
pub mod threads;

pub use reactions::ReactionAggregator;
pub use threads::ThreadStore;
