pub mod client;
pub mod config;
pub mod console;
pub mod database;
pub mod drive;
pub mod errors;
pub mod http;
pub mod server;
pub mod services;
pub mod storage;
pub mod workflow;
