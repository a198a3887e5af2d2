//! The identity-key extractor for mirrored records.

/// A record mirrored from the backend.
///
/// The engine never inspects an entity's fields; it only asks for the key
/// when indexing a snapshot. Keys must be stable for the life of the entity.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Returns the backend-assigned identity of this record.
    fn key(&self) -> &str;
}
