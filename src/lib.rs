//! Carelens core library
//!
//! This module exports the core functionality of the Carelens analytics
//! dashboard backend: the Record Store query layer, the aggregation
//! functions, the cached data-fetch layer, and the realtime refresh
//! controller that keeps aggregates fresh as rows arrive.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod export;
pub mod fetch;
pub mod models;
pub mod realtime;
pub mod store;
