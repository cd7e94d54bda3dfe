#![allow(dead_code)]

pub mod fixtures;
pub mod logging;

pub use fixtures::{host_key, location, self_signed_certificate};
pub use logging::init_test_logging;
