//! Agora - Q&A forum service
//!
//! Members ask questions, post answers, vote both up or down and accept the
//! answer that solved their problem. Every vote and acceptance moves the
//! content author's reputation, and the two always stay reconciled.
//!
//! ## Services
//!
//! - **Accounts**: registration, login, JWT sessions with revocation on ban
//! - **Questions/Answers**: asking, answering, editing, soft deletion
//! - **Voting**: toggle/switch transitions with matching reputation deltas
//! - **Notifications**: per-member inbox for answers, acceptance and removals
//! - **Moderation**: bans, bulk content removal and forum counters
//!
//! Storage sits behind the [`store::ForumStore`] trait with a MongoDB
//! backend for production and an in-memory one for development and tests.

pub mod auth;
pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod services;
pub mod store;
pub mod types;
pub mod voting;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{ForumError, Result};
