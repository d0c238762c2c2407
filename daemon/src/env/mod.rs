//! App runtime environment generation

pub mod generator;
pub mod map;
