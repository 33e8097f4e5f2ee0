//! Shared infrastructure helpers.

mod fs;

pub use fs::{read_json_file, write_json_file};

use chrono::Utc;

/// Current time in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
