//! Harbor daemon API models

pub mod models;
