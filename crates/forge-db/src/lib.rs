//! Postgres read model for creator content and profiles.
//!
//! The ingestion pipeline owns writes in production; the insert helpers here
//! exist for seeding and tests.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
