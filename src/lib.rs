pub mod arg_parser;
pub mod config;
pub mod control_loop;
pub mod ectool;
pub mod errors;
pub mod fan_curve;
pub mod fan_override;
pub mod logger;
pub mod sensors;
pub mod status;
