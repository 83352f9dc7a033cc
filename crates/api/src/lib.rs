//! HTTP API: server configuration, authentication, routing, and
//! request/response mapping.

pub mod app;
pub mod auth;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;
