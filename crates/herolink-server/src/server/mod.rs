//! Dispatcher, routing, and handler logic for the HeroService server.
//!
//! ## Structure
//!
//! - [`config`] - CLI/env arguments and validated server configuration.
//! - [`dispatch`] - listener lifecycle and per-call dispatch.
//! - [`handler`] - the method handler trait and payload decoding.
//! - [`hero`] - the FindOne handler and its hero store collaborator.
//! - [`registry`] - the immutable (service, method) routing table.
//! - [`telemetry`] - tracing subscriber initialization.

pub mod config;
pub mod dispatch;
pub mod handler;
pub mod hero;
pub mod registry;
pub mod telemetry;
