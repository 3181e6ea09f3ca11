pub use osmutil::{Breaker, ThreadedBreaker};

/// Feedback while a route is being calculated; distances are in meters.
pub trait RoutingProgress {
    fn progress(&mut self, current_max_distance: f64, overall_distance: f64);
}
