//! Component trait

/// Marker trait for components
///
/// `duplicate` produces the value stored on a copied entity. Components that
/// hold handles owned by another subsystem override it so the copy starts
/// without them.
pub trait Component: 'static + Clone {
    /// Copy this component's data for another entity
    fn duplicate(&self) -> Self {
        self.clone()
    }
}
