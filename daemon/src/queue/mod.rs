//! Durable job queue

pub mod broker;
pub mod job;
