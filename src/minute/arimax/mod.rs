/// # ARIMAX Module
///
/// Autoregressive integrated moving-average model with exogenous regressors,
/// used to forecast the close price from the same-period volume and range
/// columns.
///
/// ## Module Structure:
///
/// 1. **step_1_arimax_model**: Conditional least-squares fit and dynamic forecasting
/// 2. **step_2_arimax_selection**: Order grid and the `Estimator` binding used by grid search
///
pub mod step_1_arimax_model;
pub mod step_2_arimax_selection;
