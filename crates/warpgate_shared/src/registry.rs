use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::portal::{AgentId, GeometrySink, Portal, PortalColor, PortalPair};

/// Every agent's portal pair.
///
/// Each mutation touches one agent's entry under that entry's shard lock, so
/// readers see a pair either before or after a change, never halfway. Any
/// portal leaving the registry is released through the geometry sink here;
/// callers must not release it again.
pub struct PortalRegistry {
    pairs: DashMap<AgentId, PortalPair>,
    geometry: Arc<dyn GeometrySink>,
}

impl PortalRegistry {
    pub fn new(geometry: Arc<dyn GeometrySink>) -> Self {
        Self {
            pairs: DashMap::new(),
            geometry,
        }
    }

    /// Stores `portal` in its owner's pair and returns the replaced portal.
    ///
    /// The returned portal has already been released. The release happens
    /// under the entry lock, so no decoration pass can place the new portal
    /// before the old one's removal is submitted.
    pub fn set_portal(&self, portal: Arc<Portal>) -> Option<Arc<Portal>> {
        let owner = portal.owner();
        let mut pair = self
            .pairs
            .entry(owner)
            .or_insert_with(|| PortalPair::new(owner));
        let previous = pair.set(portal);

        if let Some(previous) = &previous {
            debug!("Replacing {previous}");
            self.release(previous);
        }
        drop(pair);
        previous
    }

    /// Clears one slot and prunes the pair once both slots are empty.
    pub fn remove_portal(&self, owner: AgentId, color: PortalColor) -> Option<Arc<Portal>> {
        let mut removed = None;
        self.pairs.remove_if_mut(&owner, |_, pair| {
            removed = pair.take(color);
            !pair.has_any()
        });

        if let Some(portal) = &removed {
            debug!("Removed {portal}");
            self.release(portal);
        }
        removed
    }

    /// Drops the whole pair, e.g. when its owner disconnects.
    pub fn remove_all_portals(&self, owner: AgentId) -> usize {
        let Some((_, pair)) = self.pairs.remove(&owner) else {
            return 0;
        };
        self.release_pair(pair)
    }

    pub fn get_portal_pair(&self, owner: AgentId) -> Option<PortalPair> {
        self.pairs.get(&owner).map(|pair| pair.clone())
    }

    pub fn get_portal(&self, owner: AgentId, color: PortalColor) -> Option<Arc<Portal>> {
        self.pairs
            .get(&owner)
            .and_then(|pair| pair.get(color).cloned())
    }

    /// Copies of every pair; later registry changes do not affect the result.
    pub fn all_portal_pairs(&self) -> Vec<PortalPair> {
        self.pairs.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn has_portal(&self, owner: AgentId, color: PortalColor) -> bool {
        self.pairs
            .get(&owner)
            .is_some_and(|pair| pair.has(color))
    }

    pub fn has_both_portals(&self, owner: AgentId) -> bool {
        self.pairs.get(&owner).is_some_and(|pair| pair.has_both())
    }

    pub fn active_agent_count(&self) -> usize {
        self.pairs.len()
    }

    pub fn total_portal_count(&self) -> usize {
        self.pairs
            .iter()
            .map(|entry| entry.value().portal_count())
            .sum()
    }

    /// Empties the registry, releasing every portal. Returns the number of
    /// portals released.
    pub fn clear_all(&self) -> usize {
        let mut drained = Vec::new();
        self.pairs.retain(|_, pair| {
            drained.push(pair.clone());
            false
        });
        drained.into_iter().map(|pair| self.release_pair(pair)).sum()
    }

    fn release_pair(&self, pair: PortalPair) -> usize {
        let owner = pair.owner();
        let mut released = 0;
        for portal in pair.into_portals() {
            self.release(&portal);
            released += 1;
        }
        debug!("Released {released} portal(s) of {owner}");
        released
    }

    fn release(&self, portal: &Portal) {
        portal.release(self.geometry.as_ref());
    }
}
