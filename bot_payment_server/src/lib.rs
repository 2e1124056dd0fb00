//! # Bot marketplace payment server
//! This crate hosts the HTTP surface of the bot marketplace. It is responsible for:
//! * Authenticating callers with bearer tokens and enforcing role-based access.
//! * Opening Paystack charges and reconciling their confirmations, whether they arrive by browser redirect, frontend
//!   callback or signed webhook.
//! * Account queries, admin bank details and the role upgrade workflow.
//! * Streaming notifications to connected users.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: Authenticated routes. See [routes](routes/index.html).
//! * `/paystack/webhook`: Paystack's signed webhook, optionally restricted to an IP whitelist.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
