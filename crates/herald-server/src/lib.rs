//! Read-only REST API: persisted records, exported environment, job manifest.

pub mod auth;
pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;
