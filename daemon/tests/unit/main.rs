//! Integration tests against a throwaway storage root and a recording compose runner

mod common;
mod test_api;
mod test_lifecycle;
mod test_recovery;
