//! Application services wiring domain logic to the adapters.

pub mod relay;

pub use relay::{RelayService, ScanReceipt};
