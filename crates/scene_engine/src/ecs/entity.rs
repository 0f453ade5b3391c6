//! Entity implementation

slotmap::new_key_type! {
    /// Entity identifier
    ///
    /// A generational slot key: cheap to copy, and stale once the entity is
    /// destroyed even if its slot is reused.
    pub struct Entity;
}

impl Entity {
    /// A handle that never refers to a live entity
    pub fn null() -> Self {
        <Self as slotmap::Key>::null()
    }

    /// Whether this is the null handle
    pub fn is_null(self) -> bool {
        <Self as slotmap::Key>::is_null(&self)
    }
}
