//! Common test utilities and synthetic plates
#![allow(dead_code)]

pub mod plates;

pub use plates::*;

/// Route `log` output through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
