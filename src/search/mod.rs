//! Semantic search over employee records.
//!
//! - [`generation`]: immutable vector snapshots and the exhaustive nearest-neighbor scan
//! - [`index`]: the shared [`VectorIndex`] with atomic generation swaps
//! - [`service`]: rebuild-from-store and search-with-hydration on top of the index
//!
//! The index is derived state. It is never persisted and only changes when a
//! rebuild runs; edits to the record store stay invisible to search until then.

pub mod generation;
pub mod index;
pub mod service;

pub use generation::{Generation, Neighbor};
pub use index::{IndexEntry, IndexStatus, RebuildReport, ScoredQuery, VectorIndex};
pub use service::{SearchHit, SearchResponse, SearchService};
