//! Data structures exchanged with TWS/Gateway.

pub mod contract;
pub mod enums;
