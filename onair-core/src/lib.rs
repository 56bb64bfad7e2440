// src/lib.rs

pub mod config;
pub mod db;
pub mod eventbus;
pub mod platforms;
pub mod repositories;
pub mod services;

pub use config::ShowConfig;
pub use db::Database;
pub use onair_common::error::Error;
