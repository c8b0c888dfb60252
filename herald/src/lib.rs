pub mod config;
pub mod control_handler;
pub mod controller;

pub use config::{ControlConfig, Herald, Primary};
pub use controller::Pipeline;
