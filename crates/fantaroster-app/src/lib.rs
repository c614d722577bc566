// Roster service and batch commands on top of fantaroster-core.

pub mod app;
pub mod commands;
pub mod config;
pub mod protocol;
pub mod ws_server;
