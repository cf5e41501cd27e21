/// # Live Module
///
/// Turns a stream of single price observations into lag-feature vectors and
/// predictions against a previously trained artifact.
///
/// ## Module Structure:
///
/// 1. **rolling_state**: Fixed-capacity buffer and the Filling/Ready state machine
/// 2. **live_loop**: Per-stream predictor and the pull-based prediction stream
///
pub mod live_loop;
pub mod rolling_state;
