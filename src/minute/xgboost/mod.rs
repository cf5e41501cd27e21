/// # XGBoost Module
///
/// Gradient-boosted regression trees over lagged close prices.
///
/// ## Module Structure:
///
/// 1. **step_1_regression_tree**: Exact greedy second-order regression tree
/// 2. **step_2_gradient_boosting**: Boosted ensemble with row subsampling
/// 3. **step_3_xgboost_selection**: Hyperparameter grid and cross-validated scoring
///
pub mod step_1_regression_tree;
pub mod step_2_gradient_boosting;
pub mod step_3_xgboost_selection;
