//! Core Components
//!
//! Transport infrastructure shared by the exchange client.

pub mod transport;

pub use transport::*;
