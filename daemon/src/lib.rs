//! Harbor daemon library
//!
//! App lifecycle orchestration: a command layer that validates and records
//! operations, a durable job queue, and workers that drive docker compose.

pub mod app;
pub mod apps;
pub mod env;
pub mod errors;
pub mod filesys;
pub mod lifecycle;
pub mod logs;
pub mod models;
pub mod notify;
pub mod queue;
pub mod server;
pub mod storage;
pub mod store;
pub mod utils;
pub mod worker;
