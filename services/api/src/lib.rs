//! services/api/src/lib.rs
//!
//! The Ascendant API service: hosts the progression store behind REST and
//! WebSocket endpoints, persists it to local files and syncs it to PostgreSQL.

pub mod adapters;
pub mod config;
pub mod error;
pub mod sync;
pub mod web;
