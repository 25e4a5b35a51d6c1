pub mod calibration;
pub mod config;
pub mod error;
pub mod export;
pub mod feature_table;
pub mod gbdt;
pub mod history;
pub mod labels;
pub mod match_store;
pub mod metrics;
pub mod pipeline;
pub mod rolling_form;
pub mod tactical;
pub mod tuning;
