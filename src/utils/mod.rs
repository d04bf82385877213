//! Utility functions shared across vtcore
//!
//! Common helpers that don't fit in specialized modules.

pub mod color;

pub use color::{parse_hex_color, parse_osc_color};
