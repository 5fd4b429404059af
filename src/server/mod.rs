//! HTTP server for Agora

pub mod http;

pub use http::{route, run, AppState};
