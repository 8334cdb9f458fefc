//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Index a collection of entities by their identifier.
///
/// Later entries win when two entities share an id.
pub fn index_by_id<E, I>(entities: I) -> std::collections::HashMap<E::Id, E>
where
    E: Entity,
    I: IntoIterator<Item = E>,
{
    entities
        .into_iter()
        .map(|entity| (entity.id().clone(), entity))
        .collect()
}
