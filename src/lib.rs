pub mod app;
pub mod backend;
pub mod cli;
pub mod config;
pub mod models;
pub mod storage;
pub mod store;
pub mod trace;
