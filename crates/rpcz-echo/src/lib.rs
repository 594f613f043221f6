#![doc = include_str!("../README.md")]

pub mod client;
pub mod config;
pub mod server;
pub mod signal;
pub mod telemetry;
