use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::{DVec3, IVec3};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::geometry::{self, FRAME_CELL_COUNT};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// Process-unique identity of one portal instance.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortalId(u64);

impl PortalId {
    fn next() -> Self {
        static NEXT_PORTAL_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_PORTAL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortalColor {
    Blue,
    Orange,
}

impl PortalColor {
    pub const ALL: [PortalColor; 2] = [PortalColor::Blue, PortalColor::Orange];

    pub fn index(self) -> usize {
        match self {
            Self::Blue => 0,
            Self::Orange => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::Blue => Self::Orange,
            Self::Orange => Self::Blue,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Blue => "Blue",
            Self::Orange => "Orange",
        }
    }
}

impl fmt::Display for PortalColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a portal instance is in its world-geometry lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecorationState {
    Pending,
    Placed,
    Released,
}

/// Materializes and clears the world cells a portal occupies.
///
/// Both calls hand work off to the portal's world and must tolerate
/// redundant invocation.
pub trait GeometrySink: Send + Sync {
    /// Returns `false` when the portal's world is not available yet.
    fn place(&self, portal: &Portal) -> bool;
    fn remove(&self, portal: &Portal);
}

#[derive(Debug)]
pub struct Portal {
    id: PortalId,
    owner: AgentId,
    color: PortalColor,
    anchor: DVec3,
    yaw: f32,
    world: String,
    decoration: Mutex<DecorationState>,
}

impl Portal {
    pub fn new(
        owner: AgentId,
        color: PortalColor,
        anchor: DVec3,
        yaw: f32,
        world: impl Into<String>,
    ) -> Self {
        Self {
            id: PortalId::next(),
            owner,
            color,
            anchor,
            yaw,
            world: world.into(),
            decoration: Mutex::new(DecorationState::Pending),
        }
    }

    pub fn id(&self) -> PortalId {
        self.id
    }

    pub fn owner(&self) -> AgentId {
        self.owner
    }

    pub fn color(&self) -> PortalColor {
        self.color
    }

    pub fn anchor(&self) -> DVec3 {
        self.anchor
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn world(&self) -> &str {
        &self.world
    }

    pub fn frame_cells(&self) -> [IVec3; FRAME_CELL_COUNT] {
        geometry::frame_cells(self.anchor, self.yaw)
    }

    pub fn center(&self) -> DVec3 {
        geometry::center_point(self.anchor)
    }

    pub fn contains(&self, point: DVec3) -> bool {
        geometry::contains_point(self.anchor, point)
    }

    pub fn decoration_state(&self) -> DecorationState {
        *self.decoration.lock()
    }

    /// Places this portal's geometry unless it was already placed or released.
    ///
    /// The state lock is held across the hand-off so a concurrent `release`
    /// is always submitted after the placement it undoes.
    pub fn decorate(&self, sink: &dyn GeometrySink) -> bool {
        let mut state = self.decoration.lock();
        if *state != DecorationState::Pending {
            return false;
        }
        if !sink.place(self) {
            return false;
        }
        *state = DecorationState::Placed;
        true
    }

    /// Retires this portal, clearing its geometry if any was placed.
    ///
    /// Returns `true` only for the call that actually cleared geometry.
    pub fn release(&self, sink: &dyn GeometrySink) -> bool {
        let mut state = self.decoration.lock();
        let previous = std::mem::replace(&mut *state, DecorationState::Released);
        if previous != DecorationState::Placed {
            return false;
        }
        sink.remove(self);
        true
    }
}

impl PartialEq for Portal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Portal {}

impl fmt::Display for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} portal #{} at [{:.1}, {:.1}, {:.1}] in '{}' (owner {})",
            self.color,
            self.id.0,
            self.anchor.x,
            self.anchor.y,
            self.anchor.z,
            self.world,
            self.owner
        )
    }
}

/// One agent's blue and orange slots.
#[derive(Debug, Clone)]
pub struct PortalPair {
    owner: AgentId,
    slots: [Option<Arc<Portal>>; 2],
}

impl PortalPair {
    pub fn new(owner: AgentId) -> Self {
        Self {
            owner,
            slots: [None, None],
        }
    }

    pub fn owner(&self) -> AgentId {
        self.owner
    }

    pub fn get(&self, color: PortalColor) -> Option<&Arc<Portal>> {
        self.slots[color.index()].as_ref()
    }

    pub fn blue(&self) -> Option<&Arc<Portal>> {
        self.get(PortalColor::Blue)
    }

    pub fn orange(&self) -> Option<&Arc<Portal>> {
        self.get(PortalColor::Orange)
    }

    /// The exit for an agent entering through `entry`.
    pub fn opposite(&self, entry: PortalColor) -> Option<&Arc<Portal>> {
        self.get(entry.other())
    }

    /// Stores `portal` in its color's slot and returns the previous occupant.
    pub fn set(&mut self, portal: Arc<Portal>) -> Option<Arc<Portal>> {
        self.slots[portal.color().index()].replace(portal)
    }

    pub fn take(&mut self, color: PortalColor) -> Option<Arc<Portal>> {
        self.slots[color.index()].take()
    }

    pub fn has(&self, color: PortalColor) -> bool {
        self.slots[color.index()].is_some()
    }

    pub fn has_both(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn has_any(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }

    pub fn portal_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Portals in blue-then-orange order.
    pub fn portals(&self) -> impl Iterator<Item = &Arc<Portal>> {
        self.slots.iter().flatten()
    }

    pub fn into_portals(self) -> impl Iterator<Item = Arc<Portal>> {
        self.slots.into_iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::DVec3;
    use parking_lot::Mutex;

    use super::{AgentId, DecorationState, GeometrySink, Portal, PortalColor, PortalId, PortalPair};

    #[derive(Default)]
    struct CountingSink {
        placed: Mutex<Vec<PortalId>>,
        removed: Mutex<Vec<PortalId>>,
        world_ready: bool,
    }

    impl GeometrySink for CountingSink {
        fn place(&self, portal: &Portal) -> bool {
            if self.world_ready {
                self.placed.lock().push(portal.id());
            }
            self.world_ready
        }

        fn remove(&self, portal: &Portal) {
            self.removed.lock().push(portal.id());
        }
    }

    fn portal(color: PortalColor, x: f64) -> Arc<Portal> {
        Arc::new(Portal::new(
            AgentId(1),
            color,
            DVec3::new(x, 64.0, 10.0),
            0.0,
            "overworld",
        ))
    }

    #[test]
    fn portals_at_the_same_spot_are_distinct_instances() {
        let a = portal(PortalColor::Blue, 10.0);
        let b = portal(PortalColor::Blue, 10.0);
        assert_ne!(a.id(), b.id());
        assert_ne!(*a, *b);
        assert_eq!(a.frame_cells(), b.frame_cells());
    }

    #[test]
    fn pair_set_returns_previous_occupant_of_same_color() {
        let mut pair = PortalPair::new(AgentId(1));
        let first = portal(PortalColor::Blue, 10.0);
        let second = portal(PortalColor::Blue, 30.0);

        assert!(pair.set(Arc::clone(&first)).is_none());
        assert!(!pair.has_both());
        assert!(pair.set(portal(PortalColor::Orange, 20.0)).is_none());
        assert!(pair.has_both());

        let previous = pair.set(Arc::clone(&second)).unwrap();
        assert_eq!(previous.id(), first.id());
        assert_eq!(pair.blue().unwrap().id(), second.id());
        assert_eq!(pair.opposite(PortalColor::Orange).unwrap().id(), second.id());
        assert_eq!(pair.portal_count(), 2);
    }

    #[test]
    fn pair_take_empties_one_slot() {
        let mut pair = PortalPair::new(AgentId(1));
        pair.set(portal(PortalColor::Orange, 20.0));
        assert!(pair.take(PortalColor::Blue).is_none());
        assert!(pair.take(PortalColor::Orange).is_some());
        assert!(!pair.has_any());
        assert_eq!(pair.portals().count(), 0);
    }

    #[test]
    fn decoration_places_once_and_releases_once() {
        let sink = CountingSink {
            world_ready: true,
            ..CountingSink::default()
        };
        let p = portal(PortalColor::Blue, 10.0);

        assert!(p.decorate(&sink));
        assert!(!p.decorate(&sink));
        assert_eq!(p.decoration_state(), DecorationState::Placed);

        assert!(p.release(&sink));
        assert!(!p.release(&sink));
        assert!(!p.decorate(&sink));
        assert_eq!(p.decoration_state(), DecorationState::Released);
        assert_eq!(sink.placed.lock().len(), 1);
        assert_eq!(sink.removed.lock().len(), 1);
    }

    #[test]
    fn release_before_placement_clears_nothing() {
        let sink = CountingSink::default();
        let p = portal(PortalColor::Orange, 10.0);

        assert!(!p.decorate(&sink));
        assert_eq!(p.decoration_state(), DecorationState::Pending);
        assert!(!p.release(&sink));
        assert!(sink.removed.lock().is_empty());
    }
}
