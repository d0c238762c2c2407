//! App directory accessor

pub mod directory;
