//! The smallest common denominator of the map database crates: progress
//! timing, logging setup, and a few collection helpers.

mod breaker;
mod collections;
pub mod logger;
mod time;

pub use crate::breaker::{Breaker, Cancelled, ThreadedBreaker};
pub use crate::collections::{wraparound_get, MultiMap};
pub use crate::time::{elapsed_seconds, prettyprint_time, prettyprint_usize, Timer};

const PROGRESS_FREQUENCY_SECONDS: f64 = 0.2;
