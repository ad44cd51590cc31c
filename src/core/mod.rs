//! Infrastructure shared by every droplet subsystem.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod pool;
pub mod rpc;
pub mod schemas;
pub mod store;
pub mod time;
