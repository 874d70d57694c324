//! regauth - Docker registry token authentication server
//!
//! This crate implements the Docker Registry Token Authentication protocol:
//! a registry client presents credentials and a requested repository scope,
//! and receives a short-lived signed bearer token describing the actions it
//! is allowed to perform. Credentials and per-repository ACLs live in Vault.

pub mod config;
pub mod error;
pub mod scope;
pub mod server;
pub mod token;
pub mod vault;
