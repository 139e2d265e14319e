//! # Recording Facade & Metadata Catalog
//!
//! Read-only accessors over a parsed JFR recording. The physical decoder
//! (chunk discovery, LEB128 scanning, bytecode-generated typed
//! deserializers) is an external collaborator; this module defines the
//! typed abstraction the rest of the engine consumes, as an object-safe
//! trait so a host can hand the evaluator any backend — a real decoder, or
//! the in-memory fixture under `tests/support/` — without this crate
//! depending on one.

pub mod catalog;

pub use catalog::{Annotation, Catalog, Field, TypeDescriptor, TypeId, TypeKind};

use crate::error::RecordingError;
use crate::value::Row;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// One chunk of a JFR recording: an independently decodable segment with its
/// own time window, as recordings are laid out on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkInfo {
    pub index: usize,
    pub offset: u64,
    pub size: u64,
    pub start_time: DateTime<Utc>,
    pub duration: ChronoDuration,
    pub compressed: bool,
}

/// The read-only interface the evaluator needs from an opened
/// recording. Object-safe (`dyn Recording`) so the engine never depends on
/// a concrete decoder crate.
pub trait Recording: Send + Sync {
    /// The in-memory type catalog: type descriptors, field lists,
    /// annotations, settings.
    fn catalog(&self) -> &Catalog;

    /// Ordered set of type names marked as events in the catalog.
    fn event_types(&self) -> Vec<String>;

    /// Ordered set of type names that have a constant pool.
    fn constant_pool_types(&self) -> Vec<String>;

    /// A restartable, ordered iterator of rows for the named event type, in
    /// file order. Each call returns a fresh iterator.
    fn iterate_events(&self, type_name: &str) -> Result<Box<dyn Iterator<Item = Row> + '_>, RecordingError>;

    /// A restartable, ordered iterator of rows for the named constant-pool
    /// type.
    fn iterate_constant_pool(
        &self,
        type_name: &str,
    ) -> Result<Box<dyn Iterator<Item = Row> + '_>, RecordingError>;

    /// Dereference a constant-pool index for the named type. Returns `None`
    /// when the index has no entry (a dangling or out-of-range reference);
    /// the evaluator treats that as a null field rather than an error.
    fn resolve_constant(&self, type_name: &str, index: i64) -> Result<Option<Row>, RecordingError>;

    /// Ordered list of chunk descriptors.
    fn chunks(&self) -> &[ChunkInfo];
}
