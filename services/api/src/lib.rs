//! Sparring API Library Crate
//!
//! This library contains all the core logic for the coaching web service:
//! the application state, durable session store, active-session registry,
//! the session orchestrator, WebSocket transport, REST handlers, and
//! routing. The binaries are thin wrappers around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod router;
pub mod state;
pub mod store;
pub mod ws;
