//!
//! Utility module for the feed-sync CLI.
//!
//! Formatting helpers used when printing stored records.
/// Utility functions for formatting and display
pub mod index;

pub use index::format_minor_units;
