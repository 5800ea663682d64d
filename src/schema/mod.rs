//! Recorded IDE event schema
//!
//! This module defines the input side of the pipeline: the events recorded
//! during developer sessions and the adapter that parses them from JSON.

mod adapter;
mod event;

pub use adapter::*;
pub use event::*;
