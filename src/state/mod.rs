//! State module for tracking per-item harvest progress
//!
//! # Components
//!
//! - `ItemState`: the states one item passes through while it is scraped
//! - `ItemProgress`: enforces the strictly sequential order of those states

mod item_state;

// Re-export main types
pub use item_state::{ItemProgress, ItemState};
