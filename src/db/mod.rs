//! Database layer for Agora
//!
//! MongoDB client wrapper plus the document schemas it stores.

pub mod mongo;
pub mod schemas;

pub use mongo::{MongoClient, MongoCollection};
