pub mod config;
pub mod constants;
pub mod error;
#[cfg(test)]
pub mod test;

/// Package metadata generated by `build.rs`
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub mod util {
    pub mod feature_engineering;
    pub mod file_utils;
    pub mod metrics;
    pub mod model_logger;
    pub mod model_utils;
    pub mod pre_processor;
    pub mod regression;
}

pub mod minute {
    pub mod arimax;
    pub mod linear;
    pub mod step_1_data_preparation;
    pub mod step_2_model_selection;
    pub mod step_3_evaluation;
    pub mod step_4_model_serialization;
    pub mod step_5_pipeline;
    pub mod xgboost;
}

pub mod api;
pub mod live;
pub mod server;
