pub mod ads;
pub mod app;
pub mod cli;
pub mod compose;
pub mod config;
pub mod contact;
pub mod highlight;
pub mod search;
pub mod session;
pub mod storage;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
