// src/lib.rs

pub mod config;
pub mod crypto;
pub mod db;
pub mod repositories;
pub mod services;
pub mod tasks;
pub mod test_utils;
pub mod txn;

pub use config::RedemptionConfig;
pub use db::Database;
pub use loyalty_common::error::Error;
pub use loyalty_common::models;
