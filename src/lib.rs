//! HR onboarding/offboarding orchestrator.

pub mod adapters;
pub mod backends;
pub mod config;
pub mod employee;
pub mod error;
pub mod routes;
pub mod workflow;
