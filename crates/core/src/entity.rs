//! Entity trait: records that are addressed by a stable identifier.

/// A persisted record with an immutable identifier.
///
/// Pickup points, receptions and products are all entities: two values with the
/// same id describe the same row, even if one of them is a stale snapshot.
pub trait Entity {
    /// Strongly-typed record identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the record identifier.
    fn id(&self) -> Self::Id;
}
