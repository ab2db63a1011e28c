//! Vote-payment settlement service.
//!
//! Sells contestant votes through the FonePay redirect flow and converts a
//! successful payment into an exactly-once credit on the contestants' vote
//! counters.

pub mod app;
pub mod callback;
pub mod configs;
pub mod creditor;
pub mod error;
pub mod logger;
pub mod metrics;
pub mod server;
pub mod session;
pub mod utils;

#[macro_export]
macro_rules! service_name {
    () => {
        env!("CARGO_PKG_NAME")
    };
}
