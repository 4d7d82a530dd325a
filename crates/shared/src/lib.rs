//! Shared configuration and errors for Trackpoint.
//!
//! This crate provides the pieces every Trackpoint binary needs:
//! - Layered configuration (files, environment, `DATABASE_URL`)
//! - Application-wide error types

pub mod config;
pub mod error;

pub use config::{AppConfig, DatabaseConfig, MigrationsConfig};
pub use error::{AppError, AppResult};
