//! Contact events

use super::{FixtureHandle, Manifold};

/// Whether a pair started or stopped touching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactPhase {
    /// Pair became touching this step
    Begin,
    /// Pair stopped touching this step
    End,
}

/// A touching-state change between two fixtures
///
/// `manifold` is the current manifold for [`ContactPhase::Begin`] and the last
/// manifold seen while touching for [`ContactPhase::End`]. Its normal points
/// from fixture A to fixture B.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactEvent {
    /// Begin or end
    pub phase: ContactPhase,
    /// First fixture of the pair
    pub fixture_a: FixtureHandle,
    /// Second fixture of the pair
    pub fixture_b: FixtureHandle,
    /// User data of the body owning fixture A
    pub user_data_a: u64,
    /// User data of the body owning fixture B
    pub user_data_b: u64,
    /// Contact geometry
    pub manifold: Manifold,
}

/// Receives contact events while the world is stepping
///
/// The world is locked during both callbacks; body and fixture creation or
/// destruction will be refused.
pub trait ContactListener {
    /// Two fixtures started touching
    fn begin_contact(&mut self, _event: &ContactEvent) {}

    /// Two fixtures stopped touching
    fn end_contact(&mut self, _event: &ContactEvent) {}
}

/// Listener that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullContactListener;

impl ContactListener for NullContactListener {}
