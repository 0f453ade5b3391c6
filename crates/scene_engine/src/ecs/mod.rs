//! Entity-Component-System implementation
//!
//! A single [`Registry`] per scene stores every component kind in its own
//! typed container. Entities are generational keys, so a handle to a
//! destroyed entity never aliases a newer one.

pub mod entity;
pub mod component;
pub mod registry;
pub mod query;
pub mod components;

pub use entity::Entity;
pub use component::Component;
pub use registry::{EcsError, Registry};
pub use query::Query;
