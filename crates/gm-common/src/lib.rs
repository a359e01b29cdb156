//! Shared building blocks for the GestMantIA binaries and libraries.

pub mod logging;
pub mod tsid;

pub use tsid::TsidGenerator;
