//! API types shared by Cobham HTTP services

pub mod types;

pub use types::{ApiResponse, ErrorBody};
