//! # Slow Query Log Normalization
//!
//! Turns raw engine output into [`SlowQueryStatistics`](crate::models::SlowQueryStatistics):
//! statements are fingerprinted, folded per database, and merged with what
//! has already been persisted for a day.

pub mod aggregate;
pub mod fingerprint;
pub mod merge;

pub use aggregate::{aggregate, RawSlowQueryEntry};
pub use fingerprint::{fingerprint, fingerprint_with, SqlDialect};
pub use merge::merge;
