//! Integration test binary -- all integration tests consolidated into a single
//! binary to keep link times down.

// Allow unwrap/expect in test code
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod helpers;

mod csv_persistence;
mod daily_check;
mod pass_lifecycle;
mod scheduler_cycle;
