//! Timestamp and identifier helpers.

pub mod timestamps;

pub use timestamps::{format_iso8601, now_utc, Timestamp};

use uuid::Uuid;

/// Generates a time-ordered run id.
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::now_v7()
}
