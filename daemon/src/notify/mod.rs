//! Client notifications and error reporting

pub mod broadcaster;
pub mod reporter;
