/// Uses env_logger; adjust the log level without recompiling with the
/// RUST_LOG env variable:
///
/// ```text
/// RUST_LOG=debug cargo test
/// ```
///
/// This can be done on a per lib basis:
///
/// ```text
/// RUST_LOG=route_graph=debug cargo test
/// ```
pub fn setup() {
    use env_logger::{Builder, Env};
    Builder::from_env(Env::default().default_filter_or("info")).init();
}
