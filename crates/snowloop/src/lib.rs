//! snowloop - warehouse table and prompt dataset connector.
//!
//! Core library exposing configuration, domain models and the warehouse and
//! document platform backends used by the sync services.

pub mod config;
pub mod models;
pub mod platform;
pub mod utils;
pub mod warehouse;
