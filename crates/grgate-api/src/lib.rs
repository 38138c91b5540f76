//! Webhook server for GRGate.
//!
//! Receives platform events over HTTP and queues a gating job for the
//! repository they concern. Metrics are served on their own listener.

pub mod error;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod state;

pub use server::{serve, serve_metrics, shutdown_signal};
pub use state::AppState;
