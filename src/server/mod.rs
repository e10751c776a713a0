//! HTTP transport for the chat broker.
//!
//! Exposes registration, sending, the talking stick and mailbox delivery
//! over JSON endpoints plus server-sent event streams. Framing lives here;
//! all chat semantics stay in [`crate::broker`].
//!
//! # Endpoints
//!
//! - `GET  /health`  — Liveness check
//! - `POST /send`    — Broadcast a chat message
//! - `GET  /events`  — Per-participant delivery stream
//!
//! See [`routes`] for the full list.

pub mod routes;

pub use routes::{app_router, AppState};
