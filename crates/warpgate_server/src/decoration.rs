use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use warpgate_core::periodic::{PeriodicTask, TaskSlot};
use warpgate_shared::portal::{DecorationState, GeometrySink, Portal, PortalColor};
use warpgate_shared::registry::PortalRegistry;

use crate::config::PortalConfig;
use crate::host::{WorldAccess, WorldDirectory};

/// Block names used to draw each portal color.
#[derive(Debug, Clone)]
pub struct BlockPalette {
    blue: String,
    orange: String,
}

impl BlockPalette {
    pub fn from_config(config: &PortalConfig) -> Self {
        Self {
            blue: config.block_for(PortalColor::Blue).to_string(),
            orange: config.block_for(PortalColor::Orange).to_string(),
        }
    }

    pub fn block(&self, color: PortalColor) -> &str {
        match color {
            PortalColor::Blue => &self.blue,
            PortalColor::Orange => &self.orange,
        }
    }
}

/// Draws portal frames into host worlds.
///
/// Work is queued on the portal's world thread. A cell the world refuses is
/// logged and the rest of the frame still goes through.
pub struct WorldGeometry {
    worlds: Arc<dyn WorldDirectory>,
    palette: BlockPalette,
}

impl WorldGeometry {
    pub fn new(worlds: Arc<dyn WorldDirectory>, palette: BlockPalette) -> Self {
        Self { worlds, palette }
    }
}

impl GeometrySink for WorldGeometry {
    fn place(&self, portal: &Portal) -> bool {
        let Some(world) = self.worlds.world(portal.world()) else {
            warn!("Cannot decorate {portal}: world is not available");
            return false;
        };

        let cells = portal.frame_cells();
        let block = self.palette.block(portal.color()).to_string();
        let label = portal.to_string();
        world.execute(Box::new(move |access: &mut dyn WorldAccess| {
            let mut placed = 0;
            for cell in cells {
                match access.set_block(cell, &block) {
                    Ok(()) => placed += 1,
                    Err(err) => warn!("Failed to place {block} at {cell} for {label}: {err}"),
                }
            }
            debug!("Placed {placed}/{} frame blocks for {label}", cells.len());
        }));
        true
    }

    fn remove(&self, portal: &Portal) {
        let Some(world) = self.worlds.world(portal.world()) else {
            warn!("Cannot clear {portal}: world is not available");
            return;
        };

        let cells = portal.frame_cells();
        let label = portal.to_string();
        world.execute(Box::new(move |access: &mut dyn WorldAccess| {
            for cell in cells {
                if let Err(err) = access.clear_block(cell) {
                    warn!("Failed to clear {cell} for {label}: {err}");
                }
            }
            debug!("Cleared frame of {label}");
        }));
    }
}

/// Hands every pending portal to `geometry` once. Returns how many were
/// placed this pass.
pub fn decorate_pending(registry: &PortalRegistry, geometry: &dyn GeometrySink) -> usize {
    let mut placed = 0;
    for pair in registry.all_portal_pairs() {
        for portal in pair.portals() {
            if portal.decoration_state() != DecorationState::Pending {
                continue;
            }
            match panic::catch_unwind(AssertUnwindSafe(|| portal.decorate(geometry))) {
                Ok(true) => placed += 1,
                Ok(false) => {}
                Err(_) => error!("Decorating {portal} panicked"),
            }
        }
    }
    placed
}

/// Periodic pass that draws newly created portals.
pub struct DecorationLoop {
    registry: Arc<PortalRegistry>,
    geometry: Arc<dyn GeometrySink>,
    interval: Duration,
    slot: TaskSlot,
}

impl DecorationLoop {
    pub fn new(
        registry: Arc<PortalRegistry>,
        geometry: Arc<dyn GeometrySink>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            geometry,
            interval,
            slot: TaskSlot::default(),
        }
    }

    pub fn start(&self) -> io::Result<bool> {
        let registry = Arc::clone(&self.registry);
        let geometry = Arc::clone(&self.geometry);
        let interval = self.interval;
        let started = self.slot.start_with(move || {
            PeriodicTask::spawn("portal-decoration", interval, move || {
                let placed = decorate_pending(&registry, &*geometry);
                if placed > 0 {
                    debug!("Decorated {placed} portal(s)");
                }
            })
        })?;
        if started {
            info!("Decoration loop started ({}ms interval)", interval.as_millis());
        }
        Ok(started)
    }

    pub fn stop(&self) -> bool {
        let stopped = self.slot.stop();
        if stopped {
            info!("Decoration loop stopped");
        }
        stopped
    }

    pub fn is_running(&self) -> bool {
        self.slot.is_running()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use glam::{DVec3, IVec3};
    use warpgate_shared::portal::{AgentId, DecorationState, GeometrySink, Portal, PortalColor};
    use warpgate_shared::registry::PortalRegistry;

    use super::{decorate_pending, BlockPalette, DecorationLoop, WorldGeometry};
    use crate::config::PortalConfig;
    use crate::world::fixtures::{universe, TEST_WORLD, WAIT};

    fn geometry_for(universe: &Arc<crate::world::Universe>) -> Arc<WorldGeometry> {
        Arc::new(WorldGeometry::new(
            universe.clone(),
            BlockPalette::from_config(&PortalConfig::default()),
        ))
    }

    #[test]
    fn pending_portals_are_drawn_once_and_cleared_on_release() {
        let universe = universe();
        let geometry = geometry_for(&universe);
        let registry = PortalRegistry::new(geometry.clone());
        let portal = Arc::new(Portal::new(
            AgentId(1),
            PortalColor::Blue,
            DVec3::new(10.0, 64.0, 10.0),
            0.0,
            TEST_WORLD,
        ));
        registry.set_portal(Arc::clone(&portal));

        assert_eq!(decorate_pending(&registry, &*geometry), 1);
        assert_eq!(decorate_pending(&registry, &*geometry), 0);
        assert_eq!(portal.decoration_state(), DecorationState::Placed);

        let world = universe.sim_world(TEST_WORLD).unwrap();
        assert!(world.flush(WAIT));
        for cell in portal.frame_cells() {
            assert_eq!(world.block_at(cell).as_deref(), Some("Cloth_Block_Wool_Blue"));
        }
        assert_eq!(world.with_state(|state| state.block_count()), 6);

        registry.remove_portal(AgentId(1), PortalColor::Blue);
        assert!(world.flush(WAIT));
        assert_eq!(world.with_state(|state| state.block_count()), 0);
    }

    #[test]
    fn rejected_cells_do_not_stop_the_rest_of_the_frame() {
        let universe = universe();
        let geometry = geometry_for(&universe);
        // Top row sits at y = 256, above the build limit.
        let portal = Portal::new(
            AgentId(2),
            PortalColor::Orange,
            DVec3::new(0.0, 254.0, 0.0),
            90.0,
            TEST_WORLD,
        );

        assert!(geometry.place(&portal));
        let world = universe.sim_world(TEST_WORLD).unwrap();
        assert!(world.flush(WAIT));

        assert_eq!(world.with_state(|state| state.block_count()), 4);
        assert_eq!(
            world.block_at(IVec3::new(1, 255, 0)).as_deref(),
            Some("Cloth_Block_Wool_Orange")
        );
        assert_eq!(world.block_at(IVec3::new(0, 256, 0)), None);
    }

    #[test]
    fn portals_in_missing_worlds_stay_pending() {
        let universe = universe();
        let geometry = geometry_for(&universe);
        let registry = PortalRegistry::new(geometry.clone());
        let portal = Arc::new(Portal::new(
            AgentId(3),
            PortalColor::Blue,
            DVec3::ZERO,
            0.0,
            "the_end",
        ));
        registry.set_portal(Arc::clone(&portal));

        assert_eq!(decorate_pending(&registry, &*geometry), 0);
        assert_eq!(portal.decoration_state(), DecorationState::Pending);

        universe.create_world("the_end").unwrap();
        assert_eq!(decorate_pending(&registry, &*geometry), 1);
    }

    #[test]
    fn loop_decorates_in_the_background_and_stops_cleanly() {
        let universe = universe();
        let geometry = geometry_for(&universe);
        let registry = Arc::new(PortalRegistry::new(geometry.clone()));
        let decoration =
            DecorationLoop::new(Arc::clone(&registry), geometry, Duration::from_millis(10));

        assert!(decoration.start().unwrap());
        assert!(!decoration.start().unwrap());
        assert!(decoration.is_running());

        let portal = Arc::new(Portal::new(
            AgentId(4),
            PortalColor::Orange,
            DVec3::new(5.0, 64.0, 5.0),
            0.0,
            TEST_WORLD,
        ));
        registry.set_portal(Arc::clone(&portal));

        let deadline = Instant::now() + WAIT;
        while portal.decoration_state() == DecorationState::Pending && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(portal.decoration_state(), DecorationState::Placed);

        assert!(decoration.stop());
        assert!(!decoration.is_running());
        assert!(!decoration.stop());
    }
}
