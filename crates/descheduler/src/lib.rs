//! Descheduler process: policy loading, control loop and HTTP endpoints

pub mod api;
pub mod runner;
pub mod settings;
