pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod logging;
pub mod market;
pub mod reader;
