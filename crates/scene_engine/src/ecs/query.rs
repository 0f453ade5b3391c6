//! Query system for component access
//!
//! A query is a tuple of component types; an entity matches when it owns
//! every one of them.

use super::{Component, Entity, Registry};

/// Set of component types an entity must own
pub trait Query {
    /// Borrowed components handed to the visitor
    type Item<'a>;

    /// Whether the entity owns every component in the set
    fn matches(registry: &Registry, entity: Entity) -> bool;

    /// Borrow the components, or `None` if any is missing
    fn fetch(registry: &Registry, entity: Entity) -> Option<Self::Item<'_>>;
}

macro_rules! impl_query {
    ($($name:ident),+) => {
        impl<$($name: Component),+> Query for ($($name,)+) {
            type Item<'a> = ($(&'a $name,)+);

            fn matches(registry: &Registry, entity: Entity) -> bool {
                $(registry.has_component::<$name>(entity))&&+
            }

            fn fetch(registry: &Registry, entity: Entity) -> Option<Self::Item<'_>> {
                Some(($(registry.get_component::<$name>(entity)?,)+))
            }
        }
    };
}

impl_query!(A);
impl_query!(A, B);
impl_query!(A, B, C);
impl_query!(A, B, C, D);
