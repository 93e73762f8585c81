pub mod app;
pub mod cli;
pub mod commands;
pub mod config_store;
pub mod error;
pub mod history_store;
pub mod image_host;
pub mod logging;
pub mod path_utils;
pub mod record_filter;
