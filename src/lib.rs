//! groundwork: a retrieval-augmented recommendation service for
//! restoration site data.
//!
//! Site records are ingested into SQLite, embedded via a configurable
//! provider, and served through a query pipeline that ranks matches by
//! relevance, assembles a bounded context window, and asks a language
//! model to summarize an answer grounded in that context. Every
//! external failure degrades to a usable response instead of an error.

pub mod config;
pub mod content;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod generation;
pub mod http;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod scoring;
pub mod server;
pub mod store;
