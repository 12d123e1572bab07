//! # curio
//!
//! The Curio binary's library half: the HTTP API, the CLI and configuration
//! loading, exposed so integration tests can build routers directly.

pub mod api;
pub mod cli;
pub mod config;
