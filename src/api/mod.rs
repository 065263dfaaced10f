//! API Module
//!
//! This module handles the REST API for recording transactions and reading
//! the balance.

mod server;
pub use server::{AppState, ErrorResponse, Server, router};
