//! Employee records service with semantic search.
//!
//! Roster keeps employee records in SQLite and serves them over HTTP. On top of
//! the record store sits an in-memory vector index: every record is projected to
//! a short text, embedded, and searched by nearest neighbor for natural-language
//! queries such as "who lives in Springfield".
//!
//! # Architecture
//!
//! - **Storage**: SQLite (WAL) holding employees and an audit log
//! - **Embeddings**: all-MiniLM-L6-v2 via ONNX Runtime (384 dimensions), or a
//!   model-free feature-hashing embedder
//! - **Search**: exhaustive squared-L2 scan over an immutable generation,
//!   replaced atomically on rebuild
//! - **Transport**: JSON over HTTP (axum)
//!
//! # Modules
//!
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema and health checks
//! - [`records`]: employee CRUD and audit log
//! - [`embedding`]: text-to-vector embedding providers
//! - [`search`]: vector index and the search service
//! - [`server`]: HTTP routes and server lifecycle

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod records;
pub mod search;
pub mod server;
