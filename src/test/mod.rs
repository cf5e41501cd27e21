pub mod live_tests;
pub mod pipeline_tests;
