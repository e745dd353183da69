//! API module for the Carelens dashboard backend.
//!
//! This module contains all HTTP-facing functionality: routes, handlers,
//! error mapping, and the live counter websocket.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod ws;

pub use routes::configure;
