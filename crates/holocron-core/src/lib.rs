pub mod cascade;
pub mod catalog;
pub mod config;
pub mod error;
pub mod format;
pub mod guide;
pub mod keys;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod reducer;
pub mod store;
