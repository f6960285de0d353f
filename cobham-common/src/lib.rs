//! # Cobham Common Library
//!
//! Shared code for the Cobham music backend including:
//! - Configuration loading
//! - Database initialization and schema
//! - API response envelope types
//! - Input sanitizing
//! - Player queue navigation model
//! - Utility functions

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod player;
pub mod sanitize;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
