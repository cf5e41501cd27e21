/// # Linear Module
///
/// Ordinary least-squares regression of the close price on its own lags,
/// the simplest baseline the lag-feature pipeline can select.
///
pub mod step_1_linear_model;
